use anyhow::{bail, Context};
use deskband_pipe::settings::DEFAULT_PIPE_NAME;
use deskband_pipe::store::Rgb;
use deskband_pipe::ControlClient;
use std::time::{Duration, Instant};
use sysinfo::{Networks, System};

const USAGE: &str = "usage: bandctl [--pipe NAME] <command>

commands:
  send FIELD...        send a raw request and print the reply
  width | height       print the host client area
  count                print the number of text records
  version              print the transport version
  add TEXT [X Y]       append a record with TEXT at X,Y
  clear                remove every record
  paint                repaint the host window
  logging on|off       toggle the diagnostic trace
  stop                 stop the control server
  monitor              show CPU and download rate until interrupted";

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut pipe = DEFAULT_PIPE_NAME.to_string();
    if args.first().map(String::as_str) == Some("--pipe") {
        if args.len() < 2 {
            bail!("--pipe needs a value\n\n{USAGE}");
        }
        pipe = args.remove(1);
        args.remove(0);
    }
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let mut client = ControlClient::connect(&pipe)?;
    match command.as_str() {
        "send" => {
            let response = client.send_command(rest)?;
            println!("{response}");
        }
        "width" => println!("{}", client.width()?),
        "height" => println!("{}", client.height()?),
        "count" => println!("{}", client.text_info_count()?),
        "version" => println!("{}", client.transport_version()?),
        "add" => {
            let text = rest.first().context("add needs TEXT")?;
            let x: i32 = rest.get(1).map(|v| v.parse()).transpose()?.unwrap_or(0);
            let y: i32 = rest.get(2).map(|v| v.parse()).transpose()?.unwrap_or(0);
            client.add_text_info(text, x, y, Rgb::new(255, 255, 255))?;
            client.paint()?;
        }
        "clear" => {
            client.clear()?;
            client.paint()?;
        }
        "paint" => client.paint()?,
        "logging" => match rest.first().map(String::as_str) {
            Some("on") => client.set_logging(true)?,
            Some("off") => client.set_logging(false)?,
            _ => bail!("logging needs on or off"),
        },
        "stop" => client.stop()?,
        "monitor" => monitor(&mut client)?,
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
    Ok(())
}

/// Two lines of live system figures, refreshed once a second.
fn monitor(client: &mut ControlClient) -> anyhow::Result<()> {
    client.clear()?;
    client.add_text_info("CPU: --", 0, 0, Rgb::new(255, 255, 255))?;
    client.add_text_info("Net: --", 0, 16, Rgb::new(255, 255, 255))?;

    let mut system = System::new();
    system.refresh_cpu_usage();
    let mut nets = Networks::new_with_refreshed_list();
    nets.refresh(true);
    let mut last = Instant::now();

    loop {
        std::thread::sleep(Duration::from_secs(1));
        system.refresh_cpu_usage();
        nets.refresh(true);
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64().max(0.001);
        last = now;

        let received: u64 = nets.iter().map(|(_, data)| data.received()).sum();
        let mbps = received as f64 * 8.0 / dt / 1_000_000.0;

        client.modify_text_info(0, &format!("CPU: {:.0}%", system.global_cpu_usage()))?;
        client.modify_text_info(1, &format!("Net: {mbps:.2} Mbps"))?;
        client.paint()?;
    }
}
