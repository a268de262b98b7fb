use std::path::Path;
use std::process::Command;

/// Open an image with the platform viewer.
///
/// Nothing is shown on a headless Linux host. Failures are logged and otherwise ignored since the
/// image has already been written.
pub(crate) fn show(path: &Path) {
    let Some(mut command) = viewer_command(path) else {
        log::debug!("No display available, not opening {}", path.display());
        return;
    };

    match command.status() {
        Ok(status) if status.success() => {}
        Ok(status) => log::warn!("Image viewer for {} exited with {status}", path.display()),
        Err(e) => log::warn!("Could not open image viewer for {}: {e}", path.display()),
    }
}

fn viewer_command(path: &Path) -> Option<Command> {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(path);
        Some(command)
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(path);
        Some(command)
    } else if std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
    {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        Some(command)
    } else {
        None
    }
}
