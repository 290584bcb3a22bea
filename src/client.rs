//! Client side of the control protocol.

use crate::channel::{self, ClientStream};
use crate::host::Size;
use crate::protocol::{encode_request, Response, Status, DELIMITER};
use crate::store::Rgb;
use anyhow::{anyhow, bail, Context};
use std::io::{BufRead, BufReader, Write};

pub struct ControlClient {
    reader: BufReader<ClientStream>,
}

impl ControlClient {
    /// Connect to the channel. Fails if no control surface is serving it.
    pub fn connect(name: &str) -> anyhow::Result<Self> {
        let stream = channel::connect(name)
            .with_context(|| format!("failed to connect to control channel '{name}'"))?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Send one request and read back the reply.
    pub fn send_command<S: AsRef<str>>(&mut self, fields: &[S]) -> anyhow::Result<Response> {
        let request = encode_request(fields);
        let stream = self.reader.get_mut();
        stream.write_all(request.as_bytes())?;
        stream.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            bail!("control channel closed before replying");
        }
        Response::decode(&line).ok_or_else(|| anyhow!("malformed reply: {}", line.trim_end()))
    }

    /// Send a request that must answer `OK`; returns the reply fields.
    pub fn expect_ok<S: AsRef<str>>(&mut self, fields: &[S]) -> anyhow::Result<Vec<String>> {
        let response = self.send_command(fields)?;
        if response.status() != Status::Ok {
            bail!(
                "{} failed with status {}",
                fields
                    .iter()
                    .map(|f| f.as_ref())
                    .collect::<Vec<_>>()
                    .join(" "),
                response.status()
            );
        }
        Ok(response.fields().to_vec())
    }

    fn expect_numbers<S: AsRef<str>, const N: usize>(
        &mut self,
        fields: &[S],
    ) -> anyhow::Result<[i64; N]> {
        let values = self.expect_ok(fields)?;
        if values.len() < N {
            bail!("expected {N} fields, got {}", values.len());
        }
        let mut out = [0i64; N];
        for (slot, value) in out.iter_mut().zip(&values) {
            *slot = value
                .parse()
                .with_context(|| format!("non-numeric reply field {value:?}"))?;
        }
        Ok(out)
    }

    pub fn width(&mut self) -> anyhow::Result<i64> {
        Ok(self.expect_numbers::<_, 1>(&["GET", "WIDTH"])?[0])
    }

    pub fn height(&mut self) -> anyhow::Result<i64> {
        Ok(self.expect_numbers::<_, 1>(&["GET", "HEIGHT"])?[0])
    }

    pub fn text_info_count(&mut self) -> anyhow::Result<usize> {
        Ok(self.expect_numbers::<_, 1>(&["GET", "TEXTINFOCOUNT"])?[0] as usize)
    }

    pub fn transport_version(&mut self) -> anyhow::Result<i64> {
        Ok(self.expect_numbers::<_, 1>(&["GET", "TRANSPORT_VERSION"])?[0])
    }

    /// Pixel extent the host would give `text`.
    pub fn text_size(&mut self, text: &str) -> anyhow::Result<Size> {
        let text = verify_text(text)?;
        let [width, height] = self.expect_numbers::<_, 2>(&["GET", "TEXTSIZE", text])?;
        Ok(Size {
            width: width as i32,
            height: height as i32,
        })
    }

    /// Create a record and fill in color, position and text.
    pub fn add_text_info(&mut self, text: &str, x: i32, y: i32, color: Rgb) -> anyhow::Result<()> {
        let text = verify_text(text)?;
        self.expect_ok(&["NEW_TEXTINFO"])?;
        self.expect_ok(&[
            "SET".to_string(),
            "RGB".to_string(),
            color.red.to_string(),
            color.green.to_string(),
            color.blue.to_string(),
        ])?;
        self.expect_ok(&["SET".to_string(), "XY".to_string(), x.to_string(), y.to_string()])?;
        self.expect_ok(&["SET", "TEXT", text])?;
        Ok(())
    }

    /// Replace the text of record `index`, leaving the target cleared afterwards.
    pub fn modify_text_info(&mut self, index: usize, text: &str) -> anyhow::Result<()> {
        let text = verify_text(text)?;
        self.expect_ok(&["SET".to_string(), "TEXTINFO_TARGET".to_string(), index.to_string()])?;
        let result = self.expect_ok(&["SET", "TEXT", text]);
        self.expect_ok(&["SET", "TEXTINFO_TARGET"])?;
        result.map(|_| ())
    }

    pub fn paint(&mut self) -> anyhow::Result<()> {
        self.expect_ok(&["PAINT"]).map(|_| ())
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.expect_ok(&["CLEAR"]).map(|_| ())
    }

    pub fn set_logging(&mut self, enabled: bool) -> anyhow::Result<()> {
        let flag = if enabled { "1" } else { "0" };
        self.expect_ok(&["SET", "LOGGING_ENABLED", flag]).map(|_| ())
    }

    /// Ask the host window to deliver message `message_id` to itself.
    pub fn send_message(&mut self, message_id: u32) -> anyhow::Result<()> {
        self.expect_ok(&["SENDMESSAGE".to_string(), message_id.to_string()])
            .map(|_| ())
    }

    pub fn set_win_msg(&mut self, message_id: u32, command: Option<&str>) -> anyhow::Result<()> {
        let mut fields = vec!["SET".to_string(), "WIN_MSG".to_string(), message_id.to_string()];
        if let Some(command) = command {
            fields.push(verify_text(command)?.to_string());
        }
        self.expect_ok(&fields).map(|_| ())
    }

    pub fn stop(&mut self) -> anyhow::Result<()> {
        self.expect_ok(&["STOP"]).map(|_| ())
    }
}

/// Reject text the wire format cannot carry.
fn verify_text(text: &str) -> anyhow::Result<&str> {
    if text.contains(DELIMITER) || text.contains('\n') {
        bail!("text cannot contain '{DELIMITER}' or a newline: {text:?}");
    }
    Ok(text)
}
