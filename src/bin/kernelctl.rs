use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::error;

use kernelctl::boot::BootEnv;
use kernelctl::feedback::ConsoleFeedback;
use kernelctl::{kernels, logging, Config, InstallError, Installer};

fn usage() -> &'static str {
    "Usage:\n  kernelctl -S <kernel>                      install a kernel from the package repository\n  kernelctl --install-source <path> <name>   build and install a kernel from a source tree\n  kernelctl -list                            list kernel packages available for install\n  kernelctl -installed                       list installed kernel images\n  kernelctl -r <kernel>                      remove an installed kernel\n  kernelctl -h | --help                      show this help"
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if matches!(args.as_slice(), [flag] if flag == "-h" || flag == "--help") {
        println!("{}", usage());
        return ExitCode::SUCCESS;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[ERROR] {err:#}");
            return ExitCode::FAILURE;
        }
    };

    // Held for the life of the process so buffered log lines get flushed.
    let _log_guard = match logging::init(&config.log_dir) {
        Ok(guard) => Some(guard),
        Err(err) => {
            // Degraded but usable: the pipeline never depends on logging.
            eprintln!("[WARN] logging disabled: {err:#}");
            None
        }
    };

    match run(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("[ERROR] {err:#}");
            let code = err
                .downcast_ref::<InstallError>()
                .map(|install_err| install_err.exit_code() as u8)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(args: &[String], config: Config) -> Result<()> {
    let feedback = ConsoleFeedback;

    match args {
        [flag, kernel] if flag == "-S" => {
            let installer = Installer::new(config, &feedback);
            let outcome = installer.install_from_repository(kernel)?;
            println!("{}", outcome.message);
            println!("backup kept at {}", outcome.backup_dir.display());
            Ok(())
        }
        [flag, path, name] if flag == "--install-source" => {
            let installer = Installer::new(config, &feedback);
            let outcome = installer.install_from_source(Path::new(path), name)?;
            println!("{}", outcome.message);
            println!("backup kept at {}", outcome.backup_dir.display());
            Ok(())
        }
        [flag] if flag == "-list" => kernels::list_available(),
        [flag] if flag == "-installed" => list_installed(&config),
        [flag, kernel] if flag == "-r" => {
            let env = BootEnv::from_config(&config);
            kernels::remove_kernel(&env, kernel, true)?;
            println!("Kernel '{kernel}' removed");
            Ok(())
        }
        _ => anyhow::bail!(usage()),
    }
}

fn list_installed(config: &Config) -> Result<()> {
    let env = BootEnv::from_config(config);
    let kernels = kernels::scan_installed(&env)
        .with_context(|| format!("scanning '{}'", env.boot_dir.display()))?;

    if kernels.is_empty() {
        println!("no kernel images found in {}", env.boot_dir.display());
        return Ok(());
    }
    for kernel in kernels {
        let marker = if kernel.is_running { " (running)" } else { "" };
        println!("{}{marker}", kernel.name);
    }
    Ok(())
}
