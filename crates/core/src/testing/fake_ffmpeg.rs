//! Shell scripts standing in for the ffmpeg binary.
//!
//! Each script takes ffmpeg's argument layout (`... -i input ... output`),
//! prints a realistic stderr transcript, writes the last argument as the
//! output file and, when `-progress <file>` is given, a progress sidecar.

#[cfg(unix)]
use std::path::{Path, PathBuf};

const PREAMBLE: &str = r#"#!/bin/sh
progress=""
prev=""
for arg; do
  if [ "$prev" = "-progress" ]; then progress="$arg"; fi
  prev="$arg"
  last="$arg"
done
header() {
  echo "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':" >&2
  echo "  Duration: 00:00:02.00, start: 0.000000, bitrate: 1000 kb/s" >&2
  echo "  Stream #0:0(und): Video: h264 (High), yuv420p, 640x360, 25 fps" >&2
  echo "Output #0, mp4, to '$last':" >&2
  echo "  Stream #0:0(und): Video: h264 (libx264), yuv420p, 640x360" >&2
  echo "Stream mapping:" >&2
  echo "  Stream #0:0 -> #0:0 (h264 (native) -> h264 (libx264))" >&2
  echo "[libx264 @ 0x55d0c0a1b2c0] using cpu capabilities: MMX2 SSE2Fast" >&2
}
report() {
  printf 'frame=%5d fps=25 q=%s %ssize=%6dkB time=%s bitrate=  8.2kbits/s\r' "$1" "$2" "$3" "$4" "$5" >&2
  if [ -n "$progress" ]; then
    printf 'frame=%d\nfps=25.00\ntotal_size=%d\nout_time_us=%d\ndup_frames=0\ndrop_frames=0\nprogress=%s\n' "$1" "$(($4 * 1024))" "$6" "$7" >> "$progress"
  fi
}
"#;

/// Encodes two seconds of media and succeeds.
pub const FAKE_FFMPEG_OK: &str = r#"header
report 25 28.0 "" 1 00:00:01.00 1000000 continue
report 50 -1.0 L 2 00:00:02.00 2000000 end
echo >&2
printf 'data' > "$last"
"#;

/// Like [`FAKE_FFMPEG_OK`] but spread over roughly 0.6 seconds.
pub const FAKE_FFMPEG_SLOW: &str = r#"header
sleep 0.3
report 25 28.0 "" 1 00:00:01.00 1000000 continue
sleep 0.3
report 50 -1.0 L 2 00:00:02.00 2000000 end
echo >&2
printf 'data' > "$last"
"#;

/// Fails the way ffmpeg does on an unknown encoder.
pub const FAKE_FFMPEG_FAIL: &str = r#"header
echo "[vost#0:0 @ 0x55d0c0a1c000] Unknown encoder 'libfoo'" >&2
echo "Error selecting an encoder" >&2
echo "Error opening output file $last." >&2
exit 1
"#;

/// Succeeds but leaves a zero-byte output.
pub const FAKE_FFMPEG_EMPTY_OUTPUT: &str = r#"header
report 50 -1.0 L 0 00:00:02.00 2000000 end
echo >&2
: > "$last"
"#;

/// Stopped by SIGTERM half way through.
pub const FAKE_FFMPEG_INTERRUPTED: &str = r#"header
report 25 28.0 "" 1 00:00:01.00 1000000 continue
echo >&2
echo "Exiting normally, received signal 15." >&2
exit 255
"#;

/// Writes an executable fake ffmpeg with `body` into `dir`.
#[cfg(unix)]
pub fn write_fake_ffmpeg(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("{}{}", PREAMBLE, body))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}
