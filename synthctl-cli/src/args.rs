use std::path::PathBuf;

pub const USAGE: &str = "\
usage: synthctl [-v] <command>

commands:
  ports                    list MIDI input and output ports
  synths                   list known synths
  request <synth> <file>   fetch the synth's edit buffer into a patch file
  send <synth> <file>      send a patch file to the synth
  monitor [layout.toml]    print incoming MIDI (and controller changes)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ports,
    Synths,
    Request { synth: String, file: PathBuf },
    Send { synth: String, file: PathBuf },
    Monitor { layout: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub verbose: bool,
    pub command: Command,
}

/// Parse the arguments after the program name.
pub fn parse(args: &[String]) -> Result<Args, String> {
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    let rest: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "--verbose" && *a != "-v")
        .collect();

    let command = match rest.as_slice() {
        ["ports"] => Command::Ports,
        ["synths"] => Command::Synths,
        ["request", synth, file] => Command::Request {
            synth: synth.to_string(),
            file: PathBuf::from(file),
        },
        ["send", synth, file] => Command::Send {
            synth: synth.to_string(),
            file: PathBuf::from(file),
        },
        ["monitor"] => Command::Monitor { layout: None },
        ["monitor", layout] => Command::Monitor {
            layout: Some(PathBuf::from(layout)),
        },
        [] => return Err("missing command".to_string()),
        [other, ..] => return Err(format!("bad arguments for '{}'", other)),
    };
    Ok(Args { verbose, command })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse(&args(&["ports"])).unwrap().command, Command::Ports);
        let parsed = parse(&args(&["-v", "request", "mopho", "x.syx"])).unwrap();
        assert!(parsed.verbose);
        assert_eq!(
            parsed.command,
            Command::Request {
                synth: "mopho".into(),
                file: PathBuf::from("x.syx")
            }
        );
        assert_eq!(
            parse(&args(&["monitor", "--verbose"])).unwrap(),
            Args {
                verbose: true,
                command: Command::Monitor { layout: None }
            }
        );
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&args(&[])).is_err());
        assert!(parse(&args(&["send", "mopho"])).is_err());
        assert!(parse(&args(&["dance"])).is_err());
    }
}
