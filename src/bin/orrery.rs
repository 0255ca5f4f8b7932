use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use orrery::geometry::{StateVector, Vec3};
use orrery::manoeuvre::ManoeuvreParameters;
use orrery::protocol::{Command, CommandType, DEFAULT_PORT};
use orrery::PluginInterface;
use std::process::Command as Process;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let default_port = DEFAULT_PORT.to_string();
    let matches = App::new("orrery")
        .version("0.1.0")
        .author("Orrery Engine Team")
        .about("🪐 Orrery - n-body engine session client")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Server host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .takes_value(true)
                .default_value(&default_port)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("ping")
                .about("🏓 Test connection to the engine server")
        )
        .subcommand(
            SubCommand::with_name("send")
                .about("📨 Send a raw command")
                .long_about("Sends one JSON command line, e.g. {\"id\":1,\"timestamp\":0,\"command_type\":\"Ping\"}")
                .arg(
                    Arg::with_name("json")
                        .help("Command as a single JSON object")
                        .required(true)
                )
        )
        .subcommand(
            SubCommand::with_name("time")
                .about("🕒 Show the current time of a plugin")
                .arg(
                    Arg::with_name("plugin")
                        .help("Raw plugin handle")
                        .required(true)
                        .validator(|v| match v.parse::<u64>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Plugin handle must be a number".into()),
                        })
                )
        )
        .subcommand(
            SubCommand::with_name("demo")
                .about("🛰️  Run a short session in-process and print what it renders")
        )
        .subcommand(
            SubCommand::with_name("server")
                .about("🚀 Start the engine server")
                .arg(
                    Arg::with_name("background")
                        .short("b")
                        .long("background")
                        .help("Run server in background")
                )
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").map_or(Ok(DEFAULT_PORT), str::parse::<u16>)?;
    let format = matches.value_of("format").unwrap_or("table");
    let verbose = matches.is_present("verbose");

    if verbose {
        println!("{}", "🪐 Orrery".bright_blue().bold());
        println!("{} {}:{}", "Connecting to".dimmed(), host, port);
    }

    match matches.subcommand() {
        ("ping", _) => {
            let response = send_command(host, port, &create_command(CommandType::Ping)).await?;
            print_command_result("Ping", &response, format);
        }
        ("send", Some(sub_matches)) => {
            let json = sub_matches.value_of("json").unwrap_or_default();
            let response = send_command(host, port, json).await?;
            print_command_result("Command", &response, format);
        }
        ("time", Some(sub_matches)) => {
            handle_time(sub_matches, host, port, format).await?;
        }
        ("demo", _) => {
            run_demo()?;
        }
        ("server", Some(sub_matches)) => {
            handle_server(sub_matches, port)?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the engine server", "orrery server".bright_cyan());
            println!("  {} Test connection", "orrery ping".bright_cyan());
            println!("  {} Run a local session", "orrery demo".bright_cyan());
        }
    }

    Ok(())
}

async fn handle_time(matches: &ArgMatches<'_>, host: &str, port: u16, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let plugin: u64 = matches.value_of("plugin").unwrap_or("0").parse()?;
    let response = send_command(host, port, &create_command(CommandType::CurrentTime { plugin })).await?;
    if format == "json" {
        println!("{}", response);
        return Ok(());
    }
    let parsed: serde_json::Value = serde_json::from_str(&response)?;
    match parsed["payload"]["Time"]["seconds"].as_f64() {
        Some(seconds) => println!("{} {} s", "🕒 Current time:".bright_white(), seconds.to_string().bright_cyan()),
        None => print_command_result("Current time", &response, format),
    }
    Ok(())
}

fn handle_server(matches: &ArgMatches<'_>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let background = matches.is_present("background");

    println!("{}", "🚀 Starting orrery engine server...".bright_green().bold());

    let port_arg = port.to_string();
    let mut cmd = Process::new("cargo");
    cmd.args(["run", "--bin", "orrery-server", "--", port_arg.as_str()]);

    if background {
        cmd.spawn()?;
        println!("{} Server started in background on port {}", "✅".green(), port);
    } else {
        println!("{} Server starting on port {} (Press Ctrl+C to stop)", "🌐".bright_blue(), port);
        cmd.status()?;
    }

    Ok(())
}

/// One sun, one vessel on a unit circular orbit, one burn.
fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let mut interface = PluginInterface::new();
    let plugin = interface.new_plugin(0.0, 0.0)?;
    interface.insert_sun(plugin, 0, 1.0)?;
    interface.end_initialization(plugin)?;

    {
        let session = interface.plugin_mut(plugin)?;
        session.insert_or_keep_vessel("V1", 0)?;
        let offset = StateVector::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        session.set_vessel_state_offset("V1", offset)?;
        session.advance_time(10.0, 0.0)?;
        println!("{} {} s", "🕒 Current time:".bright_white(), session.current_time().to_string().bright_cyan());
    }

    let transforms = interface.new_body_centred_non_rotating_transforms(plugin, 0)?;
    let line = interface.rendered_vessel_trajectory(plugin, "V1", transforms, &Vec3::zeros())?;
    println!("{} {}", "📈 Segments:".bright_white(), interface.number_of_segments(line)?.to_string().bright_cyan());
    while !interface.at_end(line)? {
        let segment = interface.fetch_and_increment(line)?;
        println!(
            "   ({:.3}, {:.3}, {:.3}) → ({:.3}, {:.3}, {:.3})",
            segment.begin.x, segment.begin.y, segment.begin.z, segment.end.x, segment.end.y, segment.end.z
        );
    }
    interface.delete_line(line)?;
    interface.delete_transforms(transforms)?;

    let manoeuvre = interface.new_manoeuvre(&ManoeuvreParameters {
        thrust: 1000.0,
        initial_mass: 1000.0,
        specific_impulse_by_weight: 300.0,
        right_ascension: 0.0,
        declination: 0.0,
        duration: 10.0,
        initial_time: 5.0,
    })?;
    let burn = interface.manoeuvre(manoeuvre)?;
    println!(
        "{} Δv {:.3} m/s, final mass {:.3} kg, ends at {}",
        "🔥 Burn:".bright_white(),
        burn.delta_v(),
        burn.final_mass(),
        burn.final_time()
    );
    interface.delete_manoeuvre(manoeuvre)?;
    interface.delete_plugin(plugin)?;

    println!("{} {}", "✅".green(), "Demo session completed".bright_green());
    Ok(())
}

// Helper functions

fn create_command(command_type: CommandType) -> String {
    let command = Command {
        id: (current_timestamp() as u32).max(1),
        timestamp: current_timestamp(),
        command_type,
    };
    serde_json::to_string(&command).unwrap_or_default()
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

fn print_command_result(action: &str, response: &str, format: &str) {
    if format == "json" {
        println!("{}", response);
        return;
    }
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(response) else {
        println!("{} {}", "❓".blue(), response);
        return;
    };
    let status = parsed["status"].as_str().unwrap_or("Unknown");
    match status {
        "Success" => {
            println!("{} {} succeeded", "✅".green(), action.bright_white());
            if !parsed["payload"].is_null() {
                println!("   {}", parsed["payload"].to_string().bright_cyan());
            }
        }
        "Sequencing" => {
            let message = parsed["message"].as_str().unwrap_or("Out of sequence");
            println!("{} {} out of sequence: {}", "⚠️".yellow(), action.bright_white(), message.bright_red());
        }
        _ => {
            let message = parsed["message"].as_str().unwrap_or("Unknown error");
            println!("{} {} failed ({}): {}", "❌".red(), action.bright_white(), status.bright_blue(), message.bright_red());
        }
    }
}

async fn send_command(host: &str, port: u16, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{} Failed to connect to engine server at {}", "❌".red(), addr.bright_white());
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "orrery server".bright_cyan());
            } else {
                eprintln!("{} Network error: {}", "🔌".yellow(), e.to_string().bright_red());
            }
            return Err(e.into());
        }
    };

    let (reader, mut writer) = stream.into_split();
    let exchange = async {
        writer.write_all(command.as_bytes()).await?;
        writer.write_all(b"\n").await?;

        let mut response = String::new();
        let n = BufReader::new(reader).read_line(&mut response).await?;
        if n == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "Server closed connection"));
        }
        Ok(response.trim_end().to_string())
    };

    match tokio::time::timeout(std::time::Duration::from_secs(5), exchange).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!("{} Command timed out after 5 seconds", "⏰".yellow());
            Err("Command timeout".into())
        }
    }
}
