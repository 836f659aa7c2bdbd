use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::dispatch::Sender;
use crate::errors::PlotError;

/// Install locations tried when no sender path is configured, in order.
pub const DEFAULT_SENDER_PATHS: &[&str] = &[
    r"C:\Program Files\Universal-G-Code-Sender\UniversalGcodeSender.jar",
    r"C:\Program Files (x86)\Universal-G-Code-Sender\UniversalGcodeSender.jar",
    "/usr/local/bin/UniversalGcodeSender.jar",
    "/opt/UniversalGcodeSender/UniversalGcodeSender.jar",
];

/// Starts a process without waiting for it.
pub trait Launcher: Send + Sync {
    fn launch(&self, program: &OsStr, args: &[OsString]) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, program: &OsStr, args: &[OsString]) -> io::Result<()> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()?;
        debug!(pid = child.id(), "Sender process started");
        Ok(())
    }
}

/// The explicit path when given, else the first default location that exists.
pub fn resolve_sender_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_from(explicit, DEFAULT_SENDER_PATHS.iter().map(PathBuf::from))
}

fn resolve_from(
    explicit: Option<&Path>,
    defaults: impl IntoIterator<Item = PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    defaults.into_iter().find(|p| p.exists())
}

pub struct UgsSender<L = ProcessLauncher> {
    program: Option<PathBuf>,
    launcher: L,
}

impl UgsSender<ProcessLauncher> {
    pub fn new(program: Option<PathBuf>) -> Self {
        UgsSender::with_launcher(program, ProcessLauncher)
    }
}

impl<L: Launcher> UgsSender<L> {
    pub fn with_launcher(program: Option<PathBuf>, launcher: L) -> Self {
        UgsSender { program, launcher }
    }
}

/// `(program, args)` that opens `gcode` in the sender at `sender`.
fn command_line(sender: &Path, gcode: &Path) -> (OsString, Vec<OsString>) {
    let is_jar = sender
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));

    if is_jar {
        (
            OsString::from("java"),
            vec![
                "-jar".into(),
                sender.as_os_str().to_owned(),
                "--open".into(),
                gcode.as_os_str().to_owned(),
            ],
        )
    } else {
        (
            sender.as_os_str().to_owned(),
            vec![
                "--open".into(),
                gcode.as_os_str().to_owned(),
                "--console".into(),
                "new".into(),
            ],
        )
    }
}

impl<L: Launcher> Sender for UgsSender<L> {
    fn dispatch(&self, program: &Path) -> Result<(), PlotError> {
        let sender = self.program.as_deref().ok_or(PlotError::SenderNotFound)?;
        if !program.exists() {
            return Err(PlotError::ProgramMissing(program.to_path_buf()));
        }
        let absolute = program.canonicalize()?;

        let (exe, args) = command_line(sender, &absolute);
        self.launcher
            .launch(&exe, &args)
            .map_err(|e| PlotError::Launch(format!("{}: {e}", exe.to_string_lossy())))?;

        info!(
            sender = %sender.display(),
            path = %absolute.display(),
            "Opened G-code in sender"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        calls: Mutex<Vec<(OsString, Vec<OsString>)>>,
        fail: bool,
    }

    impl Launcher for RecordingLauncher {
        fn launch(&self, program: &OsStr, args: &[OsString]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "java not installed"));
            }
            self.calls
                .lock()
                .unwrap()
                .push((program.to_owned(), args.to_vec()));
            Ok(())
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn written_program(dir: &Path) -> PathBuf {
        let path = dir.join("output_20240101_120000.nc");
        std::fs::write(&path, "G21\n").unwrap();
        path
    }

    #[test]
    fn test_jar_sender_runs_through_java() {
        let dir = tempfile::tempdir().unwrap();
        let gcode = written_program(dir.path());
        let sender = UgsSender::with_launcher(
            Some(PathBuf::from("/opt/ugs/UniversalGcodeSender.jar")),
            RecordingLauncher::default(),
        );

        sender.dispatch(&gcode).unwrap();

        let calls = sender.launcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (exe, args) = &calls[0];
        let absolute = gcode.canonicalize().unwrap();
        assert_eq!(exe, "java");
        assert_eq!(
            strings(args),
            vec![
                "-jar".to_string(),
                "/opt/ugs/UniversalGcodeSender.jar".to_string(),
                "--open".to_string(),
                absolute.to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn test_native_sender_opens_new_console() {
        let dir = tempfile::tempdir().unwrap();
        let gcode = written_program(dir.path());
        let sender = UgsSender::with_launcher(
            Some(PathBuf::from("/usr/bin/ugs")),
            RecordingLauncher::default(),
        );

        sender.dispatch(&gcode).unwrap();

        let calls = sender.launcher.calls.lock().unwrap();
        let (exe, args) = &calls[0];
        assert_eq!(exe, "/usr/bin/ugs");
        let args = strings(args);
        assert_eq!(args[0], "--open");
        assert!(Path::new(&args[1]).is_absolute());
        assert_eq!(&args[2..], &["--console".to_string(), "new".to_string()]);
    }

    #[test]
    fn test_unresolved_sender_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let gcode = written_program(dir.path());
        let sender = UgsSender::with_launcher(None, RecordingLauncher::default());

        let err = sender.dispatch(&gcode).unwrap_err();
        assert!(matches!(err, PlotError::SenderNotFound));
        assert!(sender.launcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_missing_program_is_reported() {
        let sender = UgsSender::with_launcher(
            Some(PathBuf::from("/usr/bin/ugs")),
            RecordingLauncher::default(),
        );
        let err = sender
            .dispatch(Path::new("/no/such/output_20240101_120000.nc"))
            .unwrap_err();
        assert!(matches!(err, PlotError::ProgramMissing(_)));
    }

    #[test]
    fn test_launch_failure_maps_to_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let gcode = written_program(dir.path());
        let launcher = RecordingLauncher {
            fail: true,
            ..RecordingLauncher::default()
        };
        let sender =
            UgsSender::with_launcher(Some(PathBuf::from("/opt/ugs/ugs.jar")), launcher);

        let err = sender.dispatch(&gcode).unwrap_err();
        assert!(matches!(err, PlotError::Launch(ref msg) if msg.contains("java not installed")));
    }

    #[test]
    fn test_resolution_prefers_explicit_then_first_existing_default() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("UniversalGcodeSender.jar");
        std::fs::write(&present, b"").unwrap();
        let absent = dir.path().join("missing.jar");

        let explicit = PathBuf::from("/custom/ugs");
        assert_eq!(
            resolve_from(Some(&explicit), vec![present.clone()]),
            Some(explicit)
        );
        assert_eq!(
            resolve_from(None, vec![absent.clone(), present.clone()]),
            Some(present)
        );
        assert_eq!(resolve_from(None, vec![absent]), None);
    }
}
