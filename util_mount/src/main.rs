extern crate cgmount_core;
#[macro_use]
extern crate clap;
extern crate env_logger;
extern crate libc;
#[macro_use]
extern crate log;
extern crate nix;
extern crate serde_json;

use ::std::process;
use ::std::sync::atomic::{AtomicBool, Ordering};
use ::std::time::Duration;
use ::libc::c_int;
use ::log::LevelFilter;
use ::nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use ::nix::unistd::Uid;
use ::cgmount_core::check::Check;
use ::cgmount_core::{Interrupter, Invocation, Runner, RunnerConfig, SuccessPolicy};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

// One-shot: the first signal interrupts the running command, a second one
// gets the default action and stops cgmount itself.
fn install_interrupt_handler() -> nix::Result<()> {
    let action = SigAction::new(SigHandler::Handler(on_interrupt), SaFlags::SA_RESETHAND,
                                SigSet::empty());
    for sig in &[Signal::SIGINT, Signal::SIGTERM] {
        unsafe { signal::sigaction(*sig, &action)?; }
    }
    Ok(())
}

fn app<'a, 'b>() -> clap::App<'a, 'b> {
    clap::App::new("cgmount")
        .version("0.1")
        .about("Mounts and unmounts cgroup filesystems through mount(8)/umount(8). \
        Without a subcommand, mounts the cpu cgroup hierarchy 'test' on /cgroup/cpu. \
        Usually requires CAP_SYS_ADMIN.")
        .arg(clap::Arg::with_name("shell")
            .long("shell")
            .takes_value(true)
            .value_name("PATH")
            .default_value(cgmount_core::DEFAULT_SHELL)
            .help("Shell used to interpret commands"))
        .arg(clap::Arg::with_name("policy")
            .long("policy")
            .takes_value(true)
            .value_name("POLICY")
            .possible_values(&["legacy", "exit-status"])
            .default_value("legacy")
            .help("legacy: fail iff anything is written to stderr. \
            exit-status: fail iff the exit status is non-zero"))
        .arg(clap::Arg::with_name("timeout")
            .long("timeout")
            .takes_value(true)
            .value_name("SECS")
            .help("Stop the command and fail after SECS seconds"))
        .arg(clap::Arg::with_name("direct")
            .long("direct")
            .help("Run mount/umount without a shell, passing arguments verbatim"))
        .arg(clap::Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .help("Increase log verbosity"))
        .subcommand(clap::SubCommand::with_name("mount")
            .about("Runs 'mount -t TYPE -o DATA NAME TARGET'")
            .arg(clap::Arg::with_name("type")
                .short("t")
                .long("type")
                .takes_value(true)
                .required(true)
                .value_name("TYPE")
                .help("Filesystem type, e.g. cgroup"))
            .arg(clap::Arg::with_name("data")
                .short("o")
                .long("options")
                .takes_value(true)
                .required(true)
                .value_name("DATA")
                .help("Mount options, e.g. cpu,cpuacct"))
            .arg(clap::Arg::with_name("name")
                .index(1)
                .required(true)
                .value_name("NAME")
                .help("Device or source name"))
            .arg(clap::Arg::with_name("target")
                .index(2)
                .required(true)
                .value_name("TARGET")
                .help("Mount point")))
        .subcommand(clap::SubCommand::with_name("umount")
            .about("Runs 'umount NAME'")
            .arg(clap::Arg::with_name("name")
                .index(1)
                .required(true)
                .value_name("NAME")
                .help("Mount point or device")))
        .subcommand(clap::SubCommand::with_name("exec")
            .about("Runs an arbitrary shell command")
            .setting(clap::AppSettings::TrailingVarArg)
            .arg(clap::Arg::with_name("json")
                .long("json")
                .help("Print the captured streams and exit code as JSON"))
            .arg(clap::Arg::with_name("command")
                .index(1)
                .required(true)
                .multiple(true)
                .allow_hyphen_values(true)
                .value_name("COMMAND")))
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn runner_config(matches: &clap::ArgMatches) -> RunnerConfig {
    RunnerConfig {
        shell: matches.value_of("shell").unwrap_or(cgmount_core::DEFAULT_SHELL).to_string(),
        policy: value_t_or_exit!(matches.value_of("policy"), SuccessPolicy),
        invocation: if matches.is_present("direct") { Invocation::Direct } else { Invocation::Shell },
        timeout: matches.value_of("timeout")
            .map(|_| Duration::from_secs(value_t_or_exit!(matches.value_of("timeout"), u64))),
        ..Default::default()
    }
}

fn warn_unless_root() {
    if !Uid::effective().is_root() {
        warn!("not running as root, mount(8) will most likely refuse");
    }
}

fn print_output(output: &str) {
    if !output.is_empty() {
        print!("{}", output);
    }
}

fn main() {
    let matches = app().get_matches();
    init_logging(matches.occurrences_of("verbose"));
    install_interrupt_handler().check("Error installing signal handlers");

    let runner = Runner::new(runner_config(&matches))
        .with_interrupter(Interrupter::from_static(&INTERRUPTED));

    match matches.subcommand() {
        ("mount", Some(sub)) => {
            warn_unless_root();
            let output = runner.mount(
                sub.value_of("name").unwrap(),
                sub.value_of("target").unwrap(),
                sub.value_of("type").unwrap(),
                sub.value_of("data").unwrap(),
            ).check("Error mounting");
            print_output(&output);
        }
        ("umount", Some(sub)) => {
            warn_unless_root();
            let output = runner.umount(sub.value_of("name").unwrap()).check("Error unmounting");
            print_output(&output);
        }
        ("exec", Some(sub)) => {
            let command = sub.values_of("command").unwrap().collect::<Vec<_>>().join(" ");
            if sub.is_present("json") {
                let captured = runner.capture_shell(&command).check("Error executing command");
                println!("{}", serde_json::to_string(&captured).check("Error encoding output"));
                if runner.config().policy.evaluate(captured).is_err() {
                    process::exit(1);
                }
            } else {
                print_output(&runner.execute(&command).check("Error executing command"));
            }
        }
        _ => {
            warn_unless_root();
            let output = runner.mount("test", "/cgroup/cpu", "cgroup", "cpu")
                .check("Error mounting test cgroup");
            print_output(&output);
        }
    }
}
