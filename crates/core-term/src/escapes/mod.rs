//! Typed escape sequences: parse/serialize pairs for everything the
//! terminal replies with or consumes beyond plain CSI dispatch.

mod device;
mod mode;
mod osc8;
mod osc66;
mod osc133;
mod terminfo;

pub use device::{
    CursorPositionReport, KittyKeyReport, OperatingStatusReport, PrimaryDeviceAttributes,
    StatusStringResponse,
};
pub use mode::{AnsiMode, DecMode, ModeQueryReply, ModeSupport};
pub use osc8::Osc8;
pub use osc66::Osc66;
pub use osc133::{CommandEntry, CommandState, Commands, Osc133};
pub use terminfo::{Capability, TerminfoString, lookup_capability};
