use crate::action_map::ActionNotFound;
use crate::host::WindowHost;
use crate::protocol::{split_request, Response, Status, TRANSPORT_VERSION};
use crate::state::SharedState;
use crate::store::{Point, Rgb, TargetInvalid};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetWidth,
    GetHeight,
    GetTextSize(String),
    GetTextInfoCount,
    GetTextInfoTarget,
    GetRgb,
    GetText,
    GetXy,
    GetTransportVersion,
    SetRgb(Rgb),
    SetText(String),
    SetXy(Point),
    SetWinMsg {
        message_id: u32,
        command: Option<String>,
    },
    SetTextInfoTarget(Option<usize>),
    SetLoggingEnabled(bool),
    NewTextInfo,
    Paint,
    Clear,
    Stop,
    SendMessage(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    BadCommand(String),
    BadArgument { field: &'static str, value: String },
    TargetInvalid(TargetInvalid),
    MsgNotFound(u32),
}

impl CommandError {
    pub fn status(&self) -> Status {
        match self {
            CommandError::BadCommand(_) => Status::BadCommand,
            CommandError::BadArgument { .. } => Status::BadArgument,
            CommandError::TargetInvalid(_) => Status::TargetInvalid,
            CommandError::MsgNotFound(_) => Status::MsgNotFound,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::BadCommand(line) => write!(f, "unrecognised command: {line}"),
            CommandError::BadArgument { field, value } => {
                write!(f, "invalid value for {field}: {value:?}")
            }
            CommandError::TargetInvalid(err) => err.fmt(f),
            CommandError::MsgNotFound(id) => write!(f, "no action registered for message {id}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<TargetInvalid> for CommandError {
    fn from(err: TargetInvalid) -> Self {
        CommandError::TargetInvalid(err)
    }
}

impl From<ActionNotFound> for CommandError {
    fn from(err: ActionNotFound) -> Self {
        CommandError::MsgNotFound(err.0)
    }
}

fn required<'a>(fields: &[&'a str], index: usize) -> Result<&'a str, CommandError> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| CommandError::BadCommand(fields.join(",")))
}

/// Optional trailing argument; an empty field counts as absent.
fn optional<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields.get(index).copied().filter(|value| !value.is_empty())
}

fn parse_number<T: FromStr>(value: &str, field: &'static str) -> Result<T, CommandError> {
    value
        .trim()
        .parse()
        .map_err(|_| CommandError::BadArgument {
            field,
            value: value.to_string(),
        })
}

fn number<T: FromStr>(
    fields: &[&str],
    index: usize,
    field: &'static str,
) -> Result<T, CommandError> {
    parse_number(required(fields, index)?, field)
}

impl Command {
    /// Interpret split request fields. Surplus fields are ignored.
    pub fn parse(fields: &[&str]) -> Result<Self, CommandError> {
        let bad = || CommandError::BadCommand(fields.join(","));
        let command = match required(fields, 0)? {
            "GET" => match required(fields, 1)? {
                "WIDTH" => Command::GetWidth,
                "HEIGHT" => Command::GetHeight,
                "TEXTSIZE" => Command::GetTextSize(required(fields, 2)?.to_string()),
                "TEXTINFOCOUNT" => Command::GetTextInfoCount,
                "TEXTINFO_TARGET" => Command::GetTextInfoTarget,
                "RGB" => Command::GetRgb,
                "TEXT" => Command::GetText,
                "XY" => Command::GetXy,
                "TRANSPORT_VERSION" => Command::GetTransportVersion,
                _ => return Err(bad()),
            },
            "SET" => match required(fields, 1)? {
                "RGB" => Command::SetRgb(Rgb {
                    red: number(fields, 2, "red")?,
                    green: number(fields, 3, "green")?,
                    blue: number(fields, 4, "blue")?,
                }),
                "TEXT" => Command::SetText(required(fields, 2)?.to_string()),
                "XY" => Command::SetXy(Point {
                    x: number(fields, 2, "x")?,
                    y: number(fields, 3, "y")?,
                }),
                "WIN_MSG" => Command::SetWinMsg {
                    message_id: number(fields, 2, "message id")?,
                    command: optional(fields, 3).map(str::to_string),
                },
                "TEXTINFO_TARGET" => Command::SetTextInfoTarget(
                    optional(fields, 2)
                        .map(|value| parse_number(value, "text info target"))
                        .transpose()?,
                ),
                "LOGGING_ENABLED" => {
                    Command::SetLoggingEnabled(number::<i64>(fields, 2, "logging enabled")? != 0)
                }
                _ => return Err(bad()),
            },
            "NEW_TEXTINFO" => Command::NewTextInfo,
            "PAINT" => Command::Paint,
            "CLEAR" => Command::Clear,
            "STOP" => Command::Stop,
            "SENDMESSAGE" => Command::SendMessage(number(fields, 1, "message id")?),
            _ => return Err(bad()),
        };
        Ok(command)
    }
}

/// Executes commands against the shared state and the window host.
///
/// The state lock is taken per command and never held across a host call.
pub struct Dispatcher {
    state: SharedState,
    host: Arc<dyn WindowHost>,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(state: SharedState, host: Arc<dyn WindowHost>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            state,
            host,
            shutdown,
        }
    }

    /// Parse and run one request line, turning every failure into a status.
    pub fn handle_line(&self, line: &str) -> Response {
        let fields = split_request(line);
        match Command::parse(&fields).and_then(|command| self.execute(command)) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(%err, "request failed");
                Response::with_status(err.status())
            }
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn execute(&self, command: Command) -> Result<Response, CommandError> {
        let response = match command {
            Command::GetWidth => Response::ok().field(self.host.client_extent().width),
            Command::GetHeight => Response::ok().field(self.host.client_extent().height),
            Command::GetTextSize(text) => {
                let size = self.host.measure_text(&text);
                Response::ok().field(size.width).field(size.height)
            }
            Command::GetTextInfoCount => {
                Response::ok().field(self.state.with(|s| s.store.count()))
            }
            Command::GetTextInfoTarget => match self.state.with(|s| s.store.target()) {
                Some(index) => Response::ok().field(index),
                None => Response::ok().field("None"),
            },
            Command::GetRgb => {
                let color = self.state.with(|s| s.store.resolve_target().map(|t| t.color))?;
                Response::ok()
                    .field(color.red)
                    .field(color.green)
                    .field(color.blue)
            }
            Command::GetText => {
                let text = self
                    .state
                    .with(|s| s.store.resolve_target().map(|t| t.text.clone()))?;
                Response::ok().field(text)
            }
            Command::GetXy => {
                let position = self
                    .state
                    .with(|s| s.store.resolve_target().map(|t| t.position))?;
                Response::ok().field(position.x).field(position.y)
            }
            // answered without resolving the target, so a bad target cannot fail it
            Command::GetTransportVersion => Response::ok().field(TRANSPORT_VERSION),
            Command::SetRgb(color) => {
                self.state.with(|s| s.store.set_color(color))?;
                Response::ok()
            }
            Command::SetText(text) => {
                self.state.with(|s| s.store.set_text(text))?;
                Response::ok()
            }
            Command::SetXy(position) => {
                self.state.with(|s| s.store.set_position(position))?;
                Response::ok()
            }
            Command::SetWinMsg {
                message_id,
                command: Some(command),
            } => {
                tracing::debug!(message_id, command = %command, "registering message action");
                self.state.with(|s| s.actions.set(message_id, command));
                Response::ok()
            }
            Command::SetWinMsg {
                message_id,
                command: None,
            } => {
                self.state.with(|s| s.actions.unset(message_id))?;
                tracing::debug!(message_id, "removed message action");
                Response::ok()
            }
            Command::SetTextInfoTarget(index) => {
                self.state.with(|s| s.store.select(index));
                match index {
                    Some(index) => tracing::debug!("text info target set to {index}"),
                    None => tracing::debug!("text info target reset"),
                }
                Response::ok()
            }
            Command::SetLoggingEnabled(enabled) => {
                crate::logging::set_diagnostics_enabled(enabled);
                Response::ok()
            }
            Command::NewTextInfo => {
                self.state.with(|s| s.store.append_default());
                Response::ok()
            }
            Command::Paint => {
                self.host.invalidate();
                Response::ok()
            }
            Command::Clear => {
                self.state.with(|s| s.store.clear_all());
                self.host.invalidate();
                Response::ok()
            }
            Command::Stop => {
                self.shutdown.store(true, Ordering::SeqCst);
                Response::ok()
            }
            Command::SendMessage(message_id) => {
                self.host.post_message(message_id);
                Response::ok()
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Size;
    use serial_test::serial;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        invalidations: Mutex<usize>,
        posted: Mutex<Vec<u32>>,
    }

    impl WindowHost for RecordingHost {
        fn client_extent(&self) -> Size {
            Size {
                width: 120,
                height: 30,
            }
        }

        fn measure_text(&self, text: &str) -> Size {
            Size {
                width: text.len() as i32 * 7,
                height: 14,
            }
        }

        fn invalidate(&self) {
            *self.invalidations.lock().unwrap() += 1;
        }

        fn post_message(&self, message_id: u32) {
            self.posted.lock().unwrap().push(message_id);
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingHost>, SharedState) {
        let host = Arc::new(RecordingHost::default());
        let state = SharedState::default();
        let dispatcher = Dispatcher::new(
            state.clone(),
            host.clone(),
            Arc::new(AtomicBool::new(false)),
        );
        (dispatcher, host, state)
    }

    fn send(dispatcher: &Dispatcher, line: &str) -> String {
        dispatcher.handle_line(line).encode()
    }

    #[test]
    fn parse_maps_verbs_and_nouns() {
        assert_eq!(Command::parse(&["GET", "WIDTH"]), Ok(Command::GetWidth));
        assert_eq!(
            Command::parse(&["SET", "RGB", "1", "2", "3"]),
            Ok(Command::SetRgb(Rgb::new(1, 2, 3)))
        );
        assert_eq!(
            Command::parse(&["SET", "WIN_MSG", "100"]),
            Ok(Command::SetWinMsg {
                message_id: 100,
                command: None
            })
        );
        assert_eq!(
            Command::parse(&["SET", "TEXTINFO_TARGET", ""]),
            Ok(Command::SetTextInfoTarget(None))
        );
        assert_eq!(Command::parse(&["SENDMESSAGE", "16"]), Ok(Command::SendMessage(16)));
    }

    #[test]
    fn parse_rejects_unknown_and_incomplete() {
        assert!(matches!(
            Command::parse(&["GET", "NOPE"]),
            Err(CommandError::BadCommand(_))
        ));
        assert!(matches!(Command::parse(&["GET"]), Err(CommandError::BadCommand(_))));
        assert!(matches!(Command::parse(&[""]), Err(CommandError::BadCommand(_))));
        assert!(matches!(
            Command::parse(&["SET", "XY", "1"]),
            Err(CommandError::BadCommand(_))
        ));
    }

    #[test]
    fn parse_reports_bad_numbers() {
        assert_eq!(
            Command::parse(&["SET", "XY", "one", "2"]),
            Err(CommandError::BadArgument {
                field: "x",
                value: "one".into()
            })
        );
        assert!(matches!(
            Command::parse(&["SET", "RGB", "-1", "0", "0"]),
            Err(CommandError::BadArgument { field: "red", .. })
        ));
    }

    #[test]
    fn window_queries_use_host() {
        let (d, _, _) = dispatcher();
        assert_eq!(send(&d, "GET,WIDTH\n"), "OK,120,\n");
        assert_eq!(send(&d, "GET,HEIGHT\n"), "OK,30,\n");
        assert_eq!(send(&d, "GET,TEXTSIZE,abcd\n"), "OK,28,14,\n");
        assert_eq!(send(&d, "GET,TRANSPORT_VERSION\n"), "OK,1,\n");
    }

    #[test]
    fn transport_version_ignores_invalid_target() {
        let (d, _, state) = dispatcher();
        send(&d, "SET,TEXTINFO_TARGET,3");
        assert_eq!(send(&d, "GET,TRANSPORT_VERSION"), "OK,1,\n");
        assert_eq!(state.with(|s| s.store.count()), 0);
    }

    #[test]
    fn count_tracks_creations_and_clear() {
        let (d, host, _) = dispatcher();
        assert_eq!(send(&d, "GET,TEXTINFOCOUNT"), "OK,0,\n");
        for _ in 0..3 {
            assert_eq!(send(&d, "NEW_TEXTINFO"), "OK,\n");
        }
        assert_eq!(send(&d, "GET,TEXTINFOCOUNT"), "OK,3,\n");
        assert_eq!(send(&d, "CLEAR"), "OK,\n");
        assert_eq!(send(&d, "GET,TEXTINFOCOUNT"), "OK,0,\n");
        assert_eq!(*host.invalidations.lock().unwrap(), 1);
    }

    #[test]
    fn target_roundtrip_and_reset() {
        let (d, _, _) = dispatcher();
        assert_eq!(send(&d, "GET,TEXTINFO_TARGET"), "OK,None,\n");
        assert_eq!(send(&d, "SET,TEXTINFO_TARGET,4"), "OK,\n");
        assert_eq!(send(&d, "GET,TEXTINFO_TARGET"), "OK,4,\n");
        assert_eq!(send(&d, "SET,TEXTINFO_TARGET"), "OK,\n");
        assert_eq!(send(&d, "GET,TEXTINFO_TARGET"), "OK,None,\n");
    }

    #[test]
    fn out_of_range_target_fails_single_record_commands() {
        let (d, _, state) = dispatcher();
        send(&d, "NEW_TEXTINFO");
        send(&d, "SET,TEXTINFO_TARGET,1");
        assert_eq!(send(&d, "GET,TEXT"), "TargetInvalid,\n");
        assert_eq!(send(&d, "GET,RGB"), "TargetInvalid,\n");
        assert_eq!(send(&d, "GET,XY"), "TargetInvalid,\n");
        assert_eq!(send(&d, "SET,TEXT,x"), "TargetInvalid,\n");
        assert_eq!(send(&d, "SET,RGB,1,2,3"), "TargetInvalid,\n");
        assert_eq!(send(&d, "SET,XY,1,2"), "TargetInvalid,\n");
        assert_eq!(state.with(|s| s.store.count()), 1);
    }

    #[test]
    fn get_text_on_empty_store_creates_one_record() {
        let (d, _, state) = dispatcher();
        assert_eq!(send(&d, "GET,TEXT"), "OK,,\n");
        assert_eq!(state.with(|s| s.store.count()), 1);
        assert_eq!(send(&d, "GET,TEXTINFOCOUNT"), "OK,1,\n");
    }

    #[test]
    fn field_setters_roundtrip() {
        let (d, _, _) = dispatcher();
        assert_eq!(send(&d, "SET,RGB,10,20,30"), "OK,\n");
        assert_eq!(send(&d, "GET,RGB"), "OK,10,20,30,\n");
        assert_eq!(send(&d, "SET,XY,-4,9"), "OK,\n");
        assert_eq!(send(&d, "GET,XY"), "OK,-4,9,\n");
        assert_eq!(send(&d, "SET,TEXT,hello"), "OK,\n");
        assert_eq!(send(&d, "SET,TEXT,hello"), "OK,\n");
        assert_eq!(send(&d, "GET,TEXT"), "OK,hello,\n");
    }

    #[test]
    fn text_with_delimiter_is_truncated() {
        let (d, _, _) = dispatcher();
        send(&d, "SET,TEXT,a,b");
        assert_eq!(send(&d, "GET,TEXT"), "OK,a,\n");
    }

    #[test]
    fn win_msg_register_and_unregister() {
        let (d, _, state) = dispatcher();
        assert_eq!(send(&d, "SET,WIN_MSG,100,notepad.exe"), "OK,\n");
        assert_eq!(
            state.with(|s| s.actions.get(100).map(str::to_string)),
            Some("notepad.exe".to_string())
        );
        assert_eq!(send(&d, "SET,WIN_MSG,100"), "OK,\n");
        assert_eq!(send(&d, "SET,WIN_MSG,100"), "MSG_NOT_FOUND,\n");
    }

    #[test]
    fn bad_input_keeps_dispatcher_usable() {
        let (d, _, _) = dispatcher();
        assert_eq!(send(&d, "FOO"), "BadCommand,\n");
        assert_eq!(send(&d, ""), "BadCommand,\n");
        assert_eq!(send(&d, "SET,XY,a,b"), "BadArgument,\n");
        assert_eq!(send(&d, "SET,WIN_MSG,abc,cmd"), "BadArgument,\n");
        assert_eq!(send(&d, "GET,TEXTSIZE"), "BadCommand,\n");
        assert_eq!(send(&d, "GET,WIDTH"), "OK,120,\n");
    }

    #[test]
    fn paint_and_sendmessage_trigger_host() {
        let (d, host, _) = dispatcher();
        assert_eq!(send(&d, "PAINT"), "OK,\n");
        assert_eq!(send(&d, "SENDMESSAGE,1025"), "OK,\n");
        assert_eq!(*host.invalidations.lock().unwrap(), 1);
        assert_eq!(*host.posted.lock().unwrap(), vec![1025]);
    }

    #[test]
    fn stop_sets_shutdown_flag() {
        let (d, _, _) = dispatcher();
        assert!(!d.stop_requested());
        assert_eq!(send(&d, "STOP"), "OK,\n");
        assert!(d.stop_requested());
    }

    #[test]
    #[serial]
    fn logging_toggle_flips_diagnostics_flag() {
        let (d, _, _) = dispatcher();
        assert_eq!(send(&d, "SET,LOGGING_ENABLED,1"), "OK,\n");
        assert!(crate::logging::diagnostics_enabled());
        assert_eq!(send(&d, "SET,LOGGING_ENABLED,0"), "OK,\n");
        assert!(!crate::logging::diagnostics_enabled());
        assert_eq!(send(&d, "SET,LOGGING_ENABLED,2"), "OK,\n");
        assert!(crate::logging::diagnostics_enabled());
        assert_eq!(send(&d, "SET,LOGGING_ENABLED,-1"), "OK,\n");
        assert!(crate::logging::diagnostics_enabled());
        assert_eq!(send(&d, "SET,LOGGING_ENABLED,0"), "OK,\n");
        assert!(!crate::logging::diagnostics_enabled());
        assert_eq!(send(&d, "SET,LOGGING_ENABLED"), "BadCommand,\n");
    }
}
