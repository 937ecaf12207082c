//! Sender loop: `meta`, bounded frames under backpressure, `done`.

use std::path::Path;

use roomdrop_common::TransferError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::channel::DataChannel;
use crate::cipher::FrameCipher;
use crate::flow::TransferOptions;
use crate::message::{ControlMessage, TransferMeta};

/// What one send loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Plaintext bytes sent.
    pub bytes: u64,
    /// Binary frames written.
    pub frames: u64,
    /// Times the loop suspended at the high-water mark.
    pub stalls: u64,
}

/// Send one transfer unit read from `reader`.
///
/// `meta.encrypted` is set from whether a cipher is given. If the reader
/// yields a different number of bytes than `meta.size`, no `done` is sent
/// and the receiver is left with an incomplete unit.
pub async fn send_unit<C, R>(
    channel: &C,
    meta: &TransferMeta,
    mut reader: R,
    cipher: Option<&FrameCipher>,
    options: &TransferOptions,
) -> Result<SendReport, TransferError>
where
    C: DataChannel + ?Sized,
    R: AsyncRead + Unpin,
{
    options.validate()?;
    let flow = options.flow_control();

    let meta = TransferMeta {
        encrypted: cipher.is_some(),
        ..meta.clone()
    };
    channel
        .send_text(ControlMessage::Meta(meta.clone()).to_json()?)
        .await?;

    let mut report = SendReport::default();
    let mut buf = vec![0u8; options.chunk_size];
    loop {
        let read = read_chunk(&mut reader, &mut buf).await?;
        if read == 0 {
            break;
        }
        let chunk = &buf[..read];
        let payload = match cipher {
            Some(cipher) => cipher.encrypt_frame(chunk)?,
            None => chunk.to_vec(),
        };
        channel.send_binary(payload).await?;
        report.bytes += read as u64;
        report.frames += 1;

        if flow.after_write(channel).await {
            report.stalls += 1;
        }
    }

    if report.bytes != meta.size {
        return Err(TransferError::SizeMismatch {
            expected: meta.size,
            received: report.bytes,
        });
    }

    channel.send_text(ControlMessage::Done.to_json()?).await?;
    debug!(
        name = %meta.name,
        bytes = report.bytes,
        frames = report.frames,
        stalls = report.stalls,
        "Transfer unit sent"
    );
    Ok(report)
}

/// Send the file at `path`, taking its name and size from the filesystem.
pub async fn send_file<C>(
    channel: &C,
    path: &Path,
    mime_type: Option<&str>,
    cipher: Option<&FrameCipher>,
    options: &TransferOptions,
) -> Result<SendReport, TransferError>
where
    C: DataChannel + ?Sized,
{
    let size = tokio::fs::metadata(path).await?.len();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::Protocol(format!("invalid file name: {}", path.display())))?;
    let meta = TransferMeta::new(name, size, mime_type);
    let file = tokio::fs::File::open(path).await?;

    info!(name, size, encrypted = cipher.is_some(), "Sending file");
    send_unit(channel, &meta, file, cipher, options).await
}

/// Fill `buf` as far as the reader allows. Only the last chunk is short.
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
