use super::Protocol;
use std::{
    io::Error,
    net::{SocketAddr, TcpStream},
};

/// Raw-socket SCPI, the usual LAN interface on port 5025.
pub struct Tcp;

impl Default for Tcp {
    fn default() -> Self {
        Tcp
    }
}

impl Protocol for Tcp {
    type IO = TcpStream;
    type Address = SocketAddr;
    type Error = Error;
    fn connect(
        self,
        address: Self::Address,
        timeout: std::time::Duration,
    ) -> Result<Self::IO, Self::Error> {
        let stream = TcpStream::connect_timeout(&address, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        Ok(stream)
    }
}
