use std::path::PathBuf;

const HELP: &str = "\
arkpad - drive a remote pedal/shifter receiver from a gamepad

USAGE:
  arkpad [OPTIONS]

OPTIONS:
  -h, --help            Prints help information
  --host <host>         Device address (overrides the config file)
  --port <port>         Device UDP port (overrides the config file)
  --config <path>       Config file (default: ~/.config/arkpad/config.toml)
  --no-gamepad          Send neutral input instead of reading a gamepad
  -v, --verbose         Log every frame and reply
";

#[derive(Debug)]
pub struct AppArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub no_gamepad: bool,
    pub verbose: bool,
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let args = AppArgs {
        host: pargs.opt_value_from_str("--host")?,
        port: pargs.opt_value_from_str("--port")?,
        config: pargs.opt_value_from_str("--config")?,
        no_gamepad: pargs.contains("--no-gamepad"),
        verbose: pargs.contains(["-v", "--verbose"]),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}
