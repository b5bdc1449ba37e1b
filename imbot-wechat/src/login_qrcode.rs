//! Login QR code output: rendered as text and written to a private file for the operator to scan.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use imbot_core::{ImbotError, Result};
use qrcode::QrCode;

/// Renders `payload` as a text QR code (`#` dark, space light, two columns per module).
pub fn render_login_qrcode(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| ImbotError::Unknown(format!("QR encode failed: {}", e)))?;
    Ok(code
        .render::<char>()
        .quiet_zone(false)
        .module_dimensions(2, 1)
        .build())
}

/// Writes the rendered QR code to `path`, truncating it. On unix the file is created `0600`.
pub fn write_login_qrcode(path: &Path, payload: &str) -> Result<()> {
    let rendered = render_login_qrcode(payload)?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(rendered.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_square_block() {
        let rendered = render_login_qrcode("https://login.weixin.qq.com/l/abc").unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(!lines.is_empty());
        // Two characters per module horizontally.
        assert_eq!(lines[0].chars().count(), lines.len() * 2);
    }

    #[test]
    fn test_write_truncates_previous_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrcode");
        std::fs::write(&path, "x".repeat(100_000)).unwrap();

        write_login_qrcode(&path, "payload").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{}\n", render_login_qrcode("payload").unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrcode");
        write_login_qrcode(&path, "payload").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
