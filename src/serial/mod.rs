// Serial transports and device wire protocols
pub mod anytone_protocol;
pub mod comm;
pub mod opengd77_protocol;
pub mod protocol;
pub mod radtel_protocol;

#[cfg(test)]
pub mod mock;

pub use anytone_protocol::{AnytoneProtocol, AnytoneRequest, AnytoneResponse};
pub use comm::{list_ports, SerialConfig, SerialError, SerialPort, Transport};
pub use opengd77_protocol::{
    ControlOption, OpenGd77Command, OpenGd77Protocol, OpenGd77Request, OpenGd77Response,
    ReadSection, WriteSection,
};
pub use protocol::{sum8, ChecksumPolicy, ProtocolError, WireProtocol};
pub use radtel_protocol::{RadtelCommand, RadtelProtocol, RadtelRequest, RadtelResponse};
