//! Interactive text menu.

use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::error;

use crate::service::{ServiceState, SoftStop, SupervisorError};
use crate::session::Session;

const MENU: &str = "\
=== ML Application ===
1. Start server
2. Upload learning base
3. List learning bases
4. Show learning base
5. Train model
6. Make prediction
7. Check server health
8. Stop server (soft)
9. Stop server (hard)
0. Exit
Choose option: ";

/// Menu loop over arbitrary input and output streams.
pub struct Menu<'a, R, W> {
    session: &'a mut Session,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(session: &'a mut Session, input: R, out: W) -> Self {
        Self {
            session,
            input,
            out,
        }
    }

    /// Run until the user exits or input ends; the service is hard-stopped on the way out.
    pub fn run(mut self) -> io::Result<()> {
        writeln!(self.out, "ML Desktop Application v{}", env!("CARGO_PKG_VERSION"))?;
        loop {
            write!(self.out, "\n{MENU}")?;
            self.out.flush()?;
            let Some(choice) = self.read_line()? else {
                break;
            };
            match choice.as_str() {
                "1" => self.start_server()?,
                "2" => self.upload()?,
                "3" => self.list()?,
                "4" => self.show()?,
                "5" => self.train()?,
                "6" => self.predict()?,
                "7" => self.health()?,
                "8" => self.stop_soft()?,
                "9" => self.stop_hard()?,
                "0" => break,
                _ => writeln!(self.out, "Invalid option!")?,
            }
        }
        if self.session.supervisor().state() != ServiceState::Stopped {
            self.session.supervisor_mut().stop_hard();
        }
        writeln!(self.out, "Application closed.")
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.out, "{label}: ")?;
        self.out.flush()?;
        self.read_line()
    }

    fn report(&mut self, action: &str, err: &dyn std::error::Error) -> io::Result<()> {
        error!("{action} failed: {err}");
        writeln!(self.out, "✗ {action} failed: {err}")
    }

    fn start_server(&mut self) -> io::Result<()> {
        writeln!(self.out, "Starting server...")?;
        match self.session.supervisor_mut().start() {
            Ok(_) => writeln!(self.out, "✓ Server started successfully!"),
            Err(SupervisorError::AlreadyRunning { state }) => {
                writeln!(self.out, "Server is already {state}.")
            }
            Err(err) => self.report("Server start", &err),
        }
    }

    fn upload(&mut self) -> io::Result<()> {
        let Some(source) = self.prompt("Path to dataset file")? else {
            return Ok(());
        };
        writeln!(
            self.out,
            "Format: name samples targets precision... features length..."
        )?;
        let Some(description) = self.prompt("Learning base description")? else {
            return Ok(());
        };
        match self.session.upload(Path::new(&source), &description) {
            Ok(paths) => writeln!(
                self.out,
                "✓ Stored dataset at {} and config at {}",
                paths.artifact.display(),
                paths.config.display()
            ),
            Err(err) => self.report("Upload", &err),
        }
    }

    fn list(&mut self) -> io::Result<()> {
        match self.session.store().list() {
            Ok(names) if names.is_empty() => writeln!(self.out, "No learning bases stored."),
            Ok(names) => {
                for name in names {
                    writeln!(self.out, "- {name}")?;
                }
                Ok(())
            }
            Err(err) => self.report("Listing", &err),
        }
    }

    fn show(&mut self) -> io::Result<()> {
        let Some(name) = self.prompt("Learning base name")? else {
            return Ok(());
        };
        match self.session.store().read_config(&name) {
            Ok(config) => {
                writeln!(self.out, "Name: {}", config.name())?;
                writeln!(self.out, "Samples: {}", config.sample_count())?;
                writeln!(
                    self.out,
                    "Targets: {} {:?}",
                    config.target_count(),
                    config.target_precision()
                )?;
                writeln!(
                    self.out,
                    "Features: {} {:?}",
                    config.feature_count(),
                    config.feature_lengths()
                )
            }
            Err(err) => self.report("Reading learning base", &err),
        }
    }

    fn train(&mut self) -> io::Result<()> {
        let Some(base) = self.prompt("Learning base name")? else {
            return Ok(());
        };
        let Some(model_type) = self.prompt("Model type")? else {
            return Ok(());
        };
        match self.session.train(&base, &model_type) {
            Ok(response) => writeln!(self.out, "✓ Training finished: {response}"),
            Err(err) => self.report("Training", &err),
        }
    }

    fn predict(&mut self) -> io::Result<()> {
        let Some(file) = self.prompt("Input file")? else {
            return Ok(());
        };
        let Some(model) = self.prompt("Model name")? else {
            return Ok(());
        };
        let Some(base) = self.prompt("Learning base name (optional)")? else {
            return Ok(());
        };
        let base = (!base.is_empty()).then_some(base.as_str());
        match self.session.predict(&file, &model, base) {
            Ok(response) => {
                writeln!(
                    self.out,
                    "✓ Prediction saved to: {}",
                    self.session.settings().output_file.display()
                )?;
                writeln!(self.out, "Result: {response}")
            }
            Err(err) => self.report("Prediction", &err),
        }
    }

    fn health(&mut self) -> io::Result<()> {
        if self.session.supervisor().is_healthy() {
            writeln!(self.out, "✓ Server is healthy!")
        } else {
            writeln!(self.out, "✗ Server is not available!")
        }
    }

    fn stop_soft(&mut self) -> io::Result<()> {
        match self.session.supervisor_mut().stop_soft() {
            Ok(SoftStop::Exited(_)) => writeln!(self.out, "Server stopped (soft)."),
            Ok(SoftStop::Killed) => writeln!(
                self.out,
                "Server ignored the shutdown request and was killed."
            ),
            Err(err) => writeln!(self.out, "{err}."),
        }
    }

    fn stop_hard(&mut self) -> io::Result<()> {
        self.session.supervisor_mut().stop_hard();
        writeln!(self.out, "Server stopped (hard).")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::AppSettings;
    use crate::service::{ReadinessPolicy, RpcTimeouts, ServiceAddress};
    use std::net::TcpListener;
    use std::time::Duration;
    use tempfile::TempDir;

    fn unreachable_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn session(dir: &TempDir) -> Session {
        let settings = AppSettings {
            interpreter: dir.path().join("python"),
            entry_point: dir.path().join("main.py"),
            output_file: dir.path().join("out").join("prediction.txt"),
            data_root: dir.path().join("bases"),
            address: ServiceAddress {
                host: "127.0.0.1".to_string(),
                port: unreachable_port(),
            },
            timeouts: RpcTimeouts {
                request: Duration::from_millis(500),
                shutdown: Duration::from_millis(200),
            },
            readiness: ReadinessPolicy {
                warmup: Duration::ZERO,
                attempts: 1,
                delay: Duration::ZERO,
            },
            soft_stop_grace: Duration::from_millis(100),
        };
        Session::new(settings, None).unwrap()
    }

    fn run_script(session: &mut Session, script: &str) -> String {
        let mut out = Vec::new();
        Menu::new(session, script.as_bytes(), &mut out).run().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn invalid_option_loops_until_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let out = run_script(&mut session, "x\n0\n");
        assert!(out.contains("Invalid option!"));
        assert!(out.ends_with("Application closed.\n"));
    }

    #[test]
    fn end_of_input_exits() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let out = run_script(&mut session, "");
        assert!(out.contains("Application closed."));
    }

    #[test]
    fn upload_then_list_and_show() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.csv");
        std::fs::write(&source, "1,2\n").unwrap();
        let mut session = session(&dir);
        let script = format!(
            "2\n{}\nBase1 1000 2 0.01 0.05 3 256 128 64\n3\n4\nBase1\n0\n",
            source.display()
        );
        let out = run_script(&mut session, &script);
        assert!(out.contains("✓ Stored dataset"));
        assert!(out.contains("- Base1"));
        assert!(out.contains("Targets: 2 [0.01, 0.05]"));
        assert!(out.contains("Features: 3 [256, 128, 64]"));
    }

    #[test]
    fn malformed_description_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("data.csv");
        std::fs::write(&source, "1,2\n").unwrap();
        let mut session = session(&dir);
        let script = format!("2\n{}\nBase1 1000 0 3 256 128 64 extra\n3\n0\n", source.display());
        let out = run_script(&mut session, &script);
        assert!(out.contains("✗ Upload failed: Invalid learning base description"));
        assert!(out.contains("No learning bases stored."));
    }

    #[test]
    fn train_is_refused_while_service_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let out = run_script(&mut session, "7\n5\nBase1\ncnn\n0\n");
        assert!(out.contains("✗ Server is not available!"));
        assert!(out.contains("✗ Training failed: Server is not available"));
    }

    #[test]
    fn start_without_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let out = run_script(&mut session, "1\n8\n9\n0\n");
        assert!(out.contains("✗ Server start failed: Service executable not found"));
        assert!(out.contains("Service is not running."));
        assert!(out.contains("Server stopped (hard)."));
        assert_eq!(session.supervisor().state(), ServiceState::Stopped);
    }
}
