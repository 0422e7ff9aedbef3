// src/archive/codec.rs

//! Compression streams for the tar-based formats
//!
//! zstd contexts are costly to build, so they live in bounded pools and are
//! leased for the whole duration of one archive operation. A leased context
//! is reset before use; a context whose operation failed is dropped instead
//! of being handed back, so no operation ever sees another one's half-used
//! stream state. The other codecs are cheap and built per stream.

use super::format::ArchiveFormat;
use flate2::Compression;
use parking_lot::{Condvar, Mutex};
use std::io::{self, BufRead, Read, Write};
use zstd::stream::raw::{self, InBuffer, Operation, OutBuffer};
use zstd::stream::zio;
use zstd::zstd_safe::CParameter;

/// Default zstd window: 2^20 = 1 MiB
pub const DEFAULT_ZSTD_WINDOW_LOG: u32 = 20;

/// Bounded pool of reusable values
pub struct Pool<T> {
    state: Mutex<PoolState<T>>,
    available: Condvar,
    capacity: usize,
}

struct PoolState<T> {
    idle: Vec<T>,
    live: usize,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                live: 0,
            }),
            available: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Take an idle value, build one if under capacity, else wait
    pub fn acquire(&self, create: impl FnOnce() -> io::Result<T>) -> io::Result<Lease<'_, T>> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.idle.pop() {
                return Ok(Lease::new(self, item));
            }
            if state.live < self.capacity {
                state.live += 1;
                drop(state);
                return match create() {
                    Ok(item) => Ok(Lease::new(self, item)),
                    Err(e) => {
                        self.release(None);
                        Err(e)
                    }
                };
            }
            self.available.wait(&mut state);
        }
    }

    fn release(&self, item: Option<T>) {
        let mut state = self.state.lock();
        match item {
            Some(item) => state.idle.push(item),
            None => state.live -= 1,
        }
        drop(state);
        self.available.notify_one();
    }

    /// Number of values currently built (idle or leased)
    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    /// Drop all idle values, returning how many were released
    pub fn drain(&self) -> usize {
        let mut state = self.state.lock();
        let drained = state.idle.len();
        state.idle.clear();
        state.live -= drained;
        drained
    }
}

/// Exclusive use of one pooled value
///
/// The value goes back to the pool only if the lease was completed;
/// otherwise it is discarded on drop.
pub struct Lease<'a, T> {
    pool: &'a Pool<T>,
    item: Option<T>,
    completed: bool,
}

impl<'a, T> Lease<'a, T> {
    fn new(pool: &'a Pool<T>, item: T) -> Self {
        Self {
            pool,
            item: Some(item),
            completed: false,
        }
    }

    fn get_mut(&mut self) -> io::Result<&mut T> {
        self.item
            .as_mut()
            .ok_or_else(|| io::Error::other("pooled codec already taken"))
    }

    fn take(&mut self) -> io::Result<T> {
        self.item
            .take()
            .ok_or_else(|| io::Error::other("pooled codec already taken"))
    }

    fn restore(&mut self, item: T) {
        self.item = Some(item);
        self.completed = true;
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl<T> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        let item = if self.completed { self.item.take() } else { None };
        self.pool.release(item);
    }
}

/// Codec settings fixed for the lifetime of an archive manager
#[derive(Debug, Clone, Copy)]
pub struct CodecSettings {
    pub zstd_window_log: u32,
    pub zstd_workers: u32,
}

/// Shared zstd encoder and decoder pools
pub struct CodecPools {
    settings: CodecSettings,
    encoders: Pool<raw::Encoder<'static>>,
    decoders: Pool<raw::Decoder<'static>>,
}

impl CodecPools {
    pub fn new(settings: CodecSettings, size: usize) -> Self {
        Self {
            settings,
            encoders: Pool::new(size),
            decoders: Pool::new(size),
        }
    }

    fn new_encoder(&self) -> io::Result<raw::Encoder<'static>> {
        let mut encoder = raw::Encoder::new(zstd::DEFAULT_COMPRESSION_LEVEL)?;
        encoder.set_parameter(CParameter::WindowLog(self.settings.zstd_window_log))?;
        if self.settings.zstd_workers > 0 {
            encoder.set_parameter(CParameter::NbWorkers(self.settings.zstd_workers))?;
        }
        Ok(encoder)
    }

    /// Open a compressing sink for a tar-based format
    pub fn compressor<W: Write>(
        &self,
        format: ArchiveFormat,
        writer: W,
        level: i32,
    ) -> io::Result<TarSink<'_, W>> {
        let sink = match format {
            ArchiveFormat::TarZst => {
                let mut lease = self.encoders.acquire(|| self.new_encoder())?;
                let mut encoder = lease.take()?;
                encoder.reinit()?;
                encoder.set_parameter(CParameter::CompressionLevel(level))?;
                TarSink::Zstd {
                    writer: zio::Writer::new(writer, encoder),
                    lease,
                }
            }
            ArchiveFormat::TarLz4 => TarSink::Lz4(lz4_flex::frame::FrameEncoder::new(writer)),
            ArchiveFormat::TarXz => {
                TarSink::Xz(xz2::write::XzEncoder::new(writer, level.clamp(0, 9) as u32))
            }
            ArchiveFormat::TarGz => TarSink::Gz(flate2::write::GzEncoder::new(
                writer,
                Compression::new(level.clamp(0, 9) as u32),
            )),
            ArchiveFormat::Zip => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "zip is not a tar-based format",
                ));
            }
        };
        Ok(sink)
    }

    /// Open a decompressing reader for a tar-based format
    pub fn decompressor<'a, R: BufRead + 'a>(
        &'a self,
        format: ArchiveFormat,
        reader: R,
    ) -> io::Result<Box<dyn Read + 'a>> {
        let source: Box<dyn Read + 'a> = match format {
            ArchiveFormat::TarZst => {
                let mut lease = self.decoders.acquire(raw::Decoder::new)?;
                lease.get_mut()?.reinit()?;
                Box::new(PooledZstdReader {
                    reader,
                    lease,
                    in_frame: false,
                    failed: false,
                })
            }
            ArchiveFormat::TarLz4 => Box::new(lz4_flex::frame::FrameDecoder::new(reader)),
            ArchiveFormat::TarXz => Box::new(xz2::read::XzDecoder::new(reader)),
            ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(reader)),
            ArchiveFormat::Zip => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "zip is not a tar-based format",
                ));
            }
        };
        Ok(source)
    }

    /// Built zstd contexts as (encoders, decoders)
    pub fn live_contexts(&self) -> (usize, usize) {
        (self.encoders.live(), self.decoders.live())
    }

    /// Release all idle contexts
    pub fn close(&self) {
        self.encoders.drain();
        self.decoders.drain();
    }
}

/// Compressing writer for one tar stream
pub enum TarSink<'a, W: Write> {
    Zstd {
        writer: zio::Writer<W, raw::Encoder<'static>>,
        lease: Lease<'a, raw::Encoder<'static>>,
    },
    Lz4(lz4_flex::frame::FrameEncoder<W>),
    Xz(xz2::write::XzEncoder<W>),
    Gz(flate2::write::GzEncoder<W>),
}

impl<W: Write> TarSink<'_, W> {
    /// Finish the compressed stream and hand back the inner writer
    pub fn finish(self) -> io::Result<W> {
        match self {
            TarSink::Zstd { mut writer, mut lease } => {
                writer.finish()?;
                let (inner, encoder) = writer.into_inner();
                lease.restore(encoder);
                Ok(inner)
            }
            TarSink::Lz4(encoder) => encoder.finish().map_err(io::Error::other),
            TarSink::Xz(encoder) => encoder.finish(),
            TarSink::Gz(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for TarSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TarSink::Zstd { writer, .. } => writer.write(buf),
            TarSink::Lz4(encoder) => encoder.write(buf),
            TarSink::Xz(encoder) => encoder.write(buf),
            TarSink::Gz(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TarSink::Zstd { writer, .. } => writer.flush(),
            TarSink::Lz4(encoder) => encoder.flush(),
            TarSink::Xz(encoder) => encoder.flush(),
            TarSink::Gz(encoder) => encoder.flush(),
        }
    }
}

/// zstd reader driving a pooled decoder context
struct PooledZstdReader<'a, R: BufRead> {
    reader: R,
    lease: Lease<'a, raw::Decoder<'static>>,
    in_frame: bool,
    failed: bool,
}

impl<R: BufRead> PooledZstdReader<'_, R> {
    fn read_inner(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let decoder = self.lease.get_mut()?;
        loop {
            let input = self.reader.fill_buf()?;
            if input.is_empty() {
                if self.in_frame {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated zstd stream",
                    ));
                }
                return Ok(0);
            }
            if !self.in_frame {
                decoder.reinit()?;
                self.in_frame = true;
            }

            let mut src = InBuffer::around(input);
            let mut dst = OutBuffer::around(&mut *buf);
            let hint = decoder.run(&mut src, &mut dst)?;
            let consumed = src.pos();
            let written = dst.pos();
            self.reader.consume(consumed);

            if hint == 0 {
                self.in_frame = false;
            }
            if written > 0 {
                return Ok(written);
            }
        }
    }
}

impl<R: BufRead> Read for PooledZstdReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let result = self.read_inner(buf);
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

impl<R: BufRead> Drop for PooledZstdReader<'_, R> {
    fn drop(&mut self) {
        if !self.failed {
            self.lease.complete();
        }
    }
}
