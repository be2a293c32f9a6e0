use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;

use structopt::StructOpt;

use rename_sim::cpu::{load_cpu_config, CPU};
use rename_sim::instructions::Program;

#[derive(StructOpt, Debug)]
#[structopt(name = "OoO Rename Simulator")]
struct Opt {
    /// Sets a custom config file
    #[structopt(short, long, parse(from_os_str), default_value = "cpu.yaml")]
    config: PathBuf,

    /// Name of the built-in demo program to run (counting-loop, ping-pong)
    #[structopt(short, long, default_value = "counting-loop")]
    program: String,

    /// Iteration count handed to the demo program
    #[structopt(short, long, default_value = "10")]
    iterations: u64,
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();

    let cpu_config_path = opt.config.to_str().unwrap();
    let cpu_config = match load_cpu_config(cpu_config_path) {
        Ok(config) => config,
        Err(error) => {
            println!("Failed to load {}. Cause: {}", cpu_config_path, error);
            exit(1);
        }
    };

    let program = match opt.program.as_str() {
        "counting-loop" => Rc::new(Program::counting_loop(opt.iterations)),
        "ping-pong" => Rc::new(Program::ping_pong(opt.iterations)),
        name => {
            println!("Unknown demo program '{}'", name);
            exit(1);
        }
    };

    let mut cpu = CPU::new(&cpu_config);
    cpu.run(&program);
    println!("r1 = {}", cpu.arch_reg_value(1));
}
