//! Outbound command link for the rover control server.
//!
//! Drive commands leave the translator as timestamped `CommandEnvelope`
//! payloads on `DRIVE_CHANNEL`; a dispatch task drains the channel and
//! publishes each envelope through a `CommandPublisher` driver (an MQTT
//! client in a real deployment). Vehicle status arriving on the far side of
//! the link is fed back in through `ingest_status` and broadcast verbatim to
//! every live operator session over `STATUS_BUS`.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use alloc::string::String;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, CriticalSectionMutex},
    channel::Channel,
    pubsub::PubSubChannel,
};
use serde::{Deserialize, Serialize};

use crate::utils::controllers::translator::{DriveCommand, DriveLabel, MotorStates};

/// Topic carrying drive commands to the vehicle.
pub const TOPIC_CONTROL: &str = "rover/control";
/// Topic carrying opaque status messages back from the vehicle.
pub const TOPIC_STATUS: &str = "rover/status";

/// Channel used to hand translated commands to the dispatch task.
pub static DRIVE_CHANNEL: Channel<CriticalSectionRawMutex, CommandEnvelope, 16> = Channel::new();

/// Broadcast bus relaying vehicle status to operator sessions. Lossy by
/// intent: statuses are periodic and each one supersedes the last.
pub static STATUS_BUS: PubSubChannel<CriticalSectionRawMutex, StatusRelay, 8, 4, 2> =
    PubSubChannel::new();

/// Last envelope handed to the publisher, exposed by the status endpoint.
static LAST_COMMAND: CriticalSectionMutex<RefCell<Option<CommandEnvelope>>> =
    CriticalSectionMutex::new(RefCell::new(None));

/// Whether the most recent publish attempt on the command path succeeded.
static LINK_UP: AtomicBool = AtomicBool::new(false);

/// Wire payload published on the control topic for every command.
///
/// Duplicate delivery is safe: the payload fully describes the motor state,
/// so re-applying it is a no-op for the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command: DriveLabel,
    pub timestamp: u64,
    pub motors: MotorStates,
    pub group1: i8,
    pub group2: i8,
}

impl CommandEnvelope {
    pub fn new(
        command: DriveCommand,
        timestamp: u64,
    ) -> Self {
        CommandEnvelope {
            command: command.label,
            timestamp,
            motors: command.motors,
            group1: command.group1,
            group2: command.group2,
        }
    }

    /// Envelope for a stop requested outside controller sampling.
    pub fn emergency_stop(timestamp: u64) -> Self {
        Self::new(DriveCommand::emergency_stop(), timestamp)
    }
}

/// One vehicle status message, relayed verbatim with a receipt timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRelay {
    pub topic: String,
    pub message: String,
    pub timestamp: u64,
}

/// Transport driver for the command path. Implementations own the actual
/// connection (MQTT client, serial bridge, log sink) and its QoS.
pub trait CommandPublisher {
    type Error;

    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
    ) -> Result<(), Self::Error>;
}

/// Errors that can occur while dispatching a command envelope.
#[derive(Debug)]
pub enum LinkError<E: core::fmt::Debug> {
    Encode(serde_json::Error),
    Publish(E),
}

/// Command-path dispatcher generic over the transport driver.
///
/// Serializes envelopes, publishes them on the control topic, and maintains
/// the link-health flag and last-command cache consulted by the HTTP status
/// endpoints.
pub struct DriveLink<Driver> {
    driver: Driver,
}

impl<Driver, E> DriveLink<Driver>
where
    Driver: CommandPublisher<Error = E>,
    E: core::fmt::Debug,
{
    pub fn new(driver: Driver) -> Self {
        DriveLink { driver }
    }

    /// Publish one envelope on the control topic.
    pub fn dispatch(
        &mut self,
        envelope: CommandEnvelope,
    ) -> Result<(), LinkError<E>> {
        let payload = serde_json::to_string(&envelope).map_err(LinkError::Encode)?;
        match self.driver.publish(TOPIC_CONTROL, &payload) {
            Ok(()) => {
                LINK_UP.store(true, Ordering::Relaxed);
                LAST_COMMAND.lock(|last| last.replace(Some(envelope)));
                tracing::info!(
                    command = ?envelope.command,
                    group1 = envelope.group1,
                    group2 = envelope.group2,
                    "drive command published"
                );
                Ok(())
            }
            Err(error) => {
                LINK_UP.store(false, Ordering::Relaxed);
                Err(LinkError::Publish(error))
            }
        }
    }
}

/// Whether the command path is currently believed to be connected.
pub fn link_up() -> bool {
    LINK_UP.load(Ordering::Relaxed)
}

/// The last envelope successfully handed to the transport.
pub fn last_command() -> Option<CommandEnvelope> {
    LAST_COMMAND.lock(|last| *last.borrow())
}

/// Feed one opaque vehicle status message into the relay bus, stamping it
/// with the receipt time. No transformation is applied to the message body.
pub fn ingest_status(
    topic: &str,
    message: &str,
) {
    let relay = StatusRelay {
        topic: String::from(topic),
        message: String::from(message),
        timestamp: embassy_time::Instant::now().as_millis(),
    };
    STATUS_BUS.immediate_publisher().publish_immediate(relay);
}
