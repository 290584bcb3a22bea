use super::Listener;
use anyhow::anyhow;
use std::io::{self, Read, Write};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{
    CloseHandle, ERROR_BROKEN_PIPE, ERROR_NO_DATA, ERROR_PIPE_CONNECTED, HANDLE,
};
use windows::Win32::Storage::FileSystem::{
    FlushFileBuffers, ReadFile, WriteFile, PIPE_ACCESS_DUPLEX,
};
use windows::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, NMPWAIT_USE_DEFAULT_WAIT,
    PIPE_READMODE_BYTE, PIPE_REJECT_REMOTE_CLIENTS, PIPE_TYPE_BYTE, PIPE_WAIT,
};

/// Raw pipe handle that may move to the server thread.
#[derive(Clone, Copy)]
struct PipeHandle(HANDLE);

// SAFETY: a pipe handle is a kernel object reference usable from any thread.
unsafe impl Send for PipeHandle {}

/// Single-instance duplex byte pipe. The handle is closed when the listener drops.
pub struct NamedPipeListener {
    handle: PipeHandle,
    address: String,
}

impl NamedPipeListener {
    pub fn bind(address: &str, buffer_size: usize) -> anyhow::Result<Self> {
        let wide: Vec<u16> = address.encode_utf16().chain(std::iter::once(0)).collect();
        let buffer_size = u32::try_from(buffer_size).unwrap_or(u32::MAX);
        let handle = unsafe {
            CreateNamedPipeW(
                PCWSTR(wide.as_ptr()),
                PIPE_ACCESS_DUPLEX,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT | PIPE_REJECT_REMOTE_CLIENTS,
                1,
                buffer_size,
                buffer_size,
                NMPWAIT_USE_DEFAULT_WAIT,
                None,
            )
        };
        if handle.is_invalid() {
            return Err(anyhow!(
                "failed to create control pipe {address}: {}",
                io::Error::last_os_error()
            ));
        }
        Ok(Self {
            handle: PipeHandle(handle),
            address: address.to_string(),
        })
    }
}

impl Listener for NamedPipeListener {
    type Conn = NamedPipeConnection;

    fn accept(&mut self) -> io::Result<NamedPipeConnection> {
        match unsafe { ConnectNamedPipe(self.handle.0, None) } {
            Ok(()) => {}
            // the client connected between CreateNamedPipeW/DisconnectNamedPipe and now
            Err(err) if err.code() == ERROR_PIPE_CONNECTED.to_hresult() => {}
            Err(err) => return Err(err.into()),
        }
        Ok(NamedPipeConnection {
            handle: self.handle,
        })
    }

    fn address(&self) -> &str {
        &self.address
    }
}

impl Drop for NamedPipeListener {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle.0);
        }
    }
}

/// The connected client. Dropping it disconnects so the pipe can accept again.
pub struct NamedPipeConnection {
    handle: PipeHandle,
}

fn is_disconnect(err: &windows::core::Error) -> bool {
    err.code() == ERROR_BROKEN_PIPE.to_hresult() || err.code() == ERROR_NO_DATA.to_hresult()
}

impl Read for NamedPipeConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read = 0u32;
        match unsafe { ReadFile(self.handle.0, Some(buf), Some(&mut read), None) } {
            Ok(()) => Ok(read as usize),
            Err(err) if is_disconnect(&err) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

impl Write for NamedPipeConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0u32;
        unsafe { WriteFile(self.handle.0, Some(buf), Some(&mut written), None) }?;
        Ok(written as usize)
    }

    // WriteFile on a byte pipe returns once the data is in the pipe buffer
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for NamedPipeConnection {
    fn drop(&mut self) {
        // let the client drain the last response before the pipe is reset
        unsafe {
            let _ = FlushFileBuffers(self.handle.0);
            let _ = DisconnectNamedPipe(self.handle.0);
        }
    }
}
