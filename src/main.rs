#[macro_use]
extern crate log;
#[macro_use]
extern crate clap;
extern crate chrono;
extern crate fern;
extern crate i2c_engine;

use std::convert::TryFrom;
use std::error;
use std::process;

use clap::{App, Arg, ArgMatches};
use i2c_engine::{
    BridgeConfig, BridgedLink, Completion, Emulation, Error, Link, MemoryRegisters, TransferConfig,
};

/// What to push through the emulated bus.
struct Job {
    chip_address: u8,
    register: u32,
    data: u32,
    burst: u32,
    data_mask: u32,
}

impl Job {
    fn word(&self, index: u32) -> u32 {
        self.data.wrapping_add(index) & self.data_mask
    }
}

fn cli() -> App<'static, 'static> {
    App::new("i2c-engine")
        .version(crate_version!())
        .about("Runs write/read round trips through an emulated I2C bus")
        .arg(
            Arg::with_name("chip-address")
                .long("chip-address")
                .value_name("ADDR")
                .default_value("0x70")
                .validator(validate_number)
                .help("7 bit address of the emulated slave"),
        )
        .arg(
            Arg::with_name("register")
                .long("register")
                .value_name("REG")
                .default_value("0x55")
                .validator(validate_number)
                .help("First register to write and read back"),
        )
        .arg(
            Arg::with_name("data")
                .long("data")
                .value_name("WORD")
                .default_value("0xAAC3")
                .validator(validate_number)
                .help("Word written to the first register, incremented per burst word"),
        )
        .arg(
            Arg::with_name("address-bytes")
                .long("address-bytes")
                .value_name("N")
                .default_value("1")
                .validator(validate_number)
                .help("Register address bytes (0-4)"),
        )
        .arg(
            Arg::with_name("data-bytes")
                .long("data-bytes")
                .value_name("N")
                .default_value("2")
                .validator(validate_number)
                .help("Bytes per data word (1-4)"),
        )
        .arg(
            Arg::with_name("divider")
                .long("divider")
                .value_name("TICKS")
                .default_value("206")
                .validator(validate_number)
                .help("Quarter bit period in ticks"),
        )
        .arg(
            Arg::with_name("burst")
                .long("burst")
                .value_name("WORDS")
                .default_value("1")
                .validator(validate_number)
                .help("Words per burst"),
        )
        .arg(
            Arg::with_name("registers")
                .long("registers")
                .value_name("COUNT")
                .default_value("256")
                .validator(validate_number)
                .help("Size of the slave's register file"),
        )
        .arg(
            Arg::with_name("push-pull")
                .long("push-pull")
                .help("Drive high levels instead of releasing (point-to-point only)"),
        )
        .arg(
            Arg::with_name("bridge")
                .long("bridge")
                .help("Put the slave behind a bus bridge on a second segment"),
        )
        .arg(
            Arg::with_name("bridge-timeout")
                .long("bridge-timeout")
                .value_name("TICKS")
                .default_value("16")
                .validator(validate_number)
                .help("Ticks the bridge waits for the far segment to release"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Log more, repeat for bit level tracing"),
        )
}

fn parse_number(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let parsed = if value.starts_with("0x") || value.starts_with("0X") {
        u32::from_str_radix(&value[2..], 16)
    } else if value.starts_with("0b") {
        u32::from_str_radix(&value[2..], 2)
    } else {
        value.parse::<u32>()
    };

    parsed.map_err(|e| format!("'{}' is not a number: {}", value, e))
}

fn validate_number(value: String) -> Result<(), String> {
    parse_number(&value).map(|_| ())
}

fn number(matches: &ArgMatches, name: &str) -> Result<u32, String> {
    parse_number(matches.value_of(name).unwrap_or_default())
}

fn narrow<T: TryFrom<u32>>(matches: &ArgMatches, name: &str) -> Result<T, String> {
    let value = number(matches, name)?;
    T::try_from(value).map_err(|_| format!("--{} value {} is out of range", name, value))
}

fn setup_logger(verbosity: u64) -> Result<(), fern::InitError> {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S%.3f]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}

fn report(label: &str, completion: &Completion) {
    println!(
        "{:<14} data {:#010x}  status {:#06b}  {} ticks",
        label, completion.data, completion.status, completion.ticks
    );
}

/// Writes the burst, reads it back and compares. Returns whether every word
/// matched and every byte was acknowledged.
fn exercise<E: Emulation>(emulation: &mut E, job: &Job) -> Result<bool, Error> {
    let last = job.burst.saturating_sub(1);
    let mut clean = true;

    emulation.master_mut().set_write_mode(last > 0);
    let completion = emulation.write(job.chip_address, job.register, job.word(0))?;
    report("write", &completion);
    clean &= completion.status == 0;

    for index in 1..job.burst {
        if index == last {
            emulation.master_mut().set_write_mode(false);
        }
        let completion = emulation.write_continue(job.word(index))?;
        report("write_continue", &completion);
        clean &= completion.status == 0;
    }

    emulation.master_mut().set_read_mode(last > 0);
    let completion = emulation.read(job.chip_address, job.register)?;
    report("read", &completion);
    clean &= completion.status == 0 && completion.data == job.word(0);

    for index in 1..job.burst {
        if index == last {
            emulation.master_mut().set_read_mode(false);
        }
        let completion = emulation.read_continue()?;
        report("read_continue", &completion);
        clean &= completion.data == job.word(index);
    }

    Ok(clean)
}

fn run(matches: &ArgMatches) -> Result<bool, Box<dyn error::Error>> {
    let chip_address: u8 = narrow(matches, "chip-address")?;
    let config = TransferConfig::new(
        chip_address,
        narrow(matches, "address-bytes")?,
        narrow(matches, "data-bytes")?,
        narrow(matches, "divider")?,
    )?
    .with_open_drain(!matches.is_present("push-pull"));

    let job = Job {
        chip_address,
        register: number(matches, "register")?,
        data: number(matches, "data")?,
        burst: number(matches, "burst")?.max(1),
        data_mask: config.data_mask(),
    };
    let registers = MemoryRegisters::zeroed(narrow(matches, "registers")?);

    info!(
        "Chip {:#04x}, {} address byte(s), {} data byte(s), divider {}",
        config.chip_address, config.address_width, config.data_width, config.clock_divider
    );

    let clean = if matches.is_present("bridge") {
        if !config.open_drain {
            warn!("Driven mode behind a bridge is not point-to-point");
        }
        let bridge = BridgeConfig::new(narrow(matches, "bridge-timeout")?)?;
        let mut link = BridgedLink::new(config, bridge)?;
        link.attach(config, registers);
        exercise(&mut link, &job)?
    } else {
        let mut link = Link::new(config);
        link.attach(config, registers);
        let clean = exercise(&mut link, &job)?;
        if link.high_conflicts() > 0 {
            warn!("{} ticks with more than one high driver", link.high_conflicts());
        }
        clean
    };

    Ok(clean)
}

fn main() {
    let matches = cli().get_matches();
    setup_logger(matches.occurrences_of("verbose")).expect("Could not init logger.");

    trace!("Setting up emulation");

    match run(&matches) {
        Ok(true) => println!("OK"),
        Ok(false) => {
            println!("MISMATCH");
            process::exit(1);
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(2);
        }
    }
}
