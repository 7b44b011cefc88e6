pub mod agent;
pub mod message;

pub use agent::{AgentConfig, AgentInfo, AgentState, ShutdownReport};
pub use message::{BROADCAST, HUMAN, Message, MessageType, SYSTEM};
