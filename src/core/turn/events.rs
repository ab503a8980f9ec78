use crate::core::transport::Inbound;

/// Everything that reaches a call's controller from outside its own streams
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Inbound(Inbound),
    /// Transport closed; tear the call down
    Hangup,
}

impl From<Inbound> for CallEvent {
    fn from(inbound: Inbound) -> Self {
        CallEvent::Inbound(inbound)
    }
}
