//! Transport for the control protocol: one listening endpoint, one client at a time.

use std::io::{self, Read, Write};

#[cfg(target_os = "windows")]
mod named_pipe;
#[cfg(unix)]
mod unix_socket;

#[cfg(target_os = "windows")]
pub use named_pipe::{NamedPipeConnection, NamedPipeListener as PlatformListener};
#[cfg(unix)]
pub use unix_socket::{UnixConnection, UnixSocketListener as PlatformListener};

#[cfg(target_os = "windows")]
pub type ClientStream = std::fs::File;
#[cfg(unix)]
pub type ClientStream = std::os::unix::net::UnixStream;

/// Server side of the channel.
pub trait Listener: Send + 'static {
    type Conn: Read + Write + Send;

    /// Block until a client connects.
    fn accept(&mut self) -> io::Result<Self::Conn>;

    /// Full address clients connect to.
    fn address(&self) -> &str;
}

/// Resolve a channel name to the address the platform listens on. Names that are
/// already full addresses are returned unchanged.
#[cfg(target_os = "windows")]
pub fn address_for(name: &str) -> String {
    if name.starts_with(r"\\") {
        name.to_string()
    } else {
        format!(r"\\.\pipe\{name}")
    }
}

#[cfg(unix)]
pub fn address_for(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        std::env::temp_dir()
            .join(format!("{name}.sock"))
            .to_string_lossy()
            .into_owned()
    }
}

/// Acquire the channel. Fails if it cannot be created or is already served.
pub fn bind(name: &str, buffer_size: usize) -> anyhow::Result<PlatformListener> {
    let address = address_for(name);
    #[cfg(target_os = "windows")]
    {
        PlatformListener::bind(&address, buffer_size)
    }
    #[cfg(unix)]
    {
        let _ = buffer_size;
        PlatformListener::bind(std::path::Path::new(&address))
    }
}

/// Open the client side of the channel.
pub fn connect(name: &str) -> io::Result<ClientStream> {
    let address = address_for(name);
    #[cfg(target_os = "windows")]
    {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(address)
    }
    #[cfg(unix)]
    {
        ClientStream::connect(address)
    }
}
