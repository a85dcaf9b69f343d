// CleanLog - app/launcher.rs
//
// One-command startup. Prefers the container path when a container runtime
// is on PATH; otherwise builds locally and runs the dashboard directly.
//
// Exit status: 1 when the local build fails (after printing the
// remediation text), 0 otherwise. Container build/run failures surface as
// whatever the runtime prints.

use crate::platform::fs;
use crate::util::constants;
use crate::util::error::LaunchError;
use std::io::Write;
use std::process::Command;

/// Printed when the local build fails.
pub const REMEDIATION: [&str; 3] = [
    "1. Install the platform build tools (a C toolchain: build-essential, Xcode Command Line Tools, or MSVC Build Tools) and retry.",
    "2. Or use the container path: docker build -t cleanlog . && docker run -p 8501:8501 cleanlog",
    "3. See README.md (Troubleshooting) for details.",
];

/// Runs external commands. The system implementation spawns processes;
/// tests record the calls instead.
pub trait CommandRunner {
    /// Whether `program` resolves on PATH.
    fn on_path(&self, program: &str) -> bool;

    /// Run `program` to completion with inherited stdio. `Ok(true)` on a
    /// zero exit status.
    fn run(&mut self, program: &str, args: &[String]) -> Result<bool, LaunchError>;
}

/// Spawns real processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn on_path(&self, program: &str) -> bool {
        fs::find_executable(program).is_some()
    }

    fn run(&mut self, program: &str, args: &[String]) -> Result<bool, LaunchError> {
        tracing::debug!(program, ?args, "Running command");
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| LaunchError::Spawn {
                program: program.to_string(),
                source,
            })?;
        tracing::debug!(program, code = ?status.code(), "Command finished");
        Ok(status.success())
    }
}

/// Launcher settings, from `[launcher]` in config.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub container_runtime: String,
    pub image_tag: String,
    pub port: u16,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            container_runtime: constants::DEFAULT_CONTAINER_RUNTIME.to_string(),
            image_tag: constants::DEFAULT_IMAGE_TAG.to_string(),
            port: constants::DEFAULT_SERVER_PORT,
        }
    }
}

/// Path of the locally built dashboard binary.
pub fn local_binary() -> String {
    if cfg!(windows) {
        r"target\release\cleanlog.exe".to_string()
    } else {
        "target/release/cleanlog".to_string()
    }
}

/// Start the dashboard; returns the process exit status.
pub fn launch<R: CommandRunner, W: Write>(
    runner: &mut R,
    settings: &LaunchSettings,
    out: &mut W,
) -> Result<i32, LaunchError> {
    let say = |out: &mut W, line: &str| writeln!(out, "{line}").map_err(|source| LaunchError::Output { source });
    let runtime = settings.container_runtime.as_str();
    // The image's CMD always listens on the default port.
    let publish = format!("{}:{}", settings.port, constants::DEFAULT_SERVER_PORT);

    if runner.on_path(runtime) {
        tracing::info!(runtime, image = %settings.image_tag, publish = %publish, "Container runtime found");
        say(out, &format!("{runtime} found, starting CleanLog in a container..."))?;
        runner.run(runtime, &strings(&["build", "-t", &settings.image_tag, "."]))?;
        runner.run(runtime, &strings(&["run", "-p", &publish, &settings.image_tag]))?;
        return Ok(0);
    }

    tracing::info!(runtime, "No container runtime on PATH, building locally");
    say(out, "No container runtime found, building CleanLog locally...")?;
    let built = match runner.run("cargo", &strings(&["build", "--release"])) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "Local build could not start");
            false
        }
    };
    if !built {
        say(out, "Dependency installation failed. Try one of the following:")?;
        for line in REMEDIATION {
            say(out, line)?;
        }
        return Ok(1);
    }

    say(out, &format!("Starting CleanLog on http://localhost:{}", settings.port))?;
    let port = settings.port.to_string();
    runner.run(
        &local_binary(),
        &strings(&[
            "serve",
            "--server.port",
            &port,
            "--server.address",
            constants::DEFAULT_SERVER_ADDRESS,
        ]),
    )?;
    Ok(0)
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}
