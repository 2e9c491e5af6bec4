//! Два несовместимых варианта протокола за одним интерфейсом.
//!
//! [`PhxiCodec`] разбирает PHXI заголовок и IQDQ/META кадры в любом формате
//! выборок. [`Ft32Codec`] разбирает упрощённый поток FT32/DATA, где выборки
//! всегда Float32. Парсеры намеренно раздельные: общий у них только
//! [`Framer`] с возобновляемым чтением.

use std::io::{self, Read};

use iqfall_types::{
    ByteOrderKind, DataFrameHeader, MetaUpdate, ProtocolError, ProtocolKind, ProtocolResult,
    ResourceError, SampleFormat, StreamHeader, StreamInfo,
};
use log::{debug, info, warn};

use crate::{
    format::{
        decode_ft32_header, magic_of, magic_tag, DataFrameHeaderExt, MetaUpdateExt,
        StreamHeaderExt, FRAME_HEADER_SIZE, FT32_HEADER_SIZE, MAGIC_DATA, MAGIC_FT32, MAGIC_IQDQ,
        MAGIC_META, MAGIC_PHXI, MAGIC_SIZE, MAX_FRAME_SAMPLES, META_FRAME_SIZE, PHXI_HEADER_SIZE,
    },
    reader::{ExactReader, Fill},
    sequence::SequenceTracker,
};

/// Общий интерфейс кодеков потока.
pub trait StreamCodec: Send {
    /// Вариант протокола
    fn kind(&self) -> ProtocolKind;

    /// Читает заголовок потока. Вызывается один раз сразу после connect.
    fn handshake(&mut self) -> ProtocolResult<StreamInfo>;

    /// Читает следующий кадр. [`Frame::Idle`] означает "данных в этом тике
    /// нет": частично прочитанный кадр будет дочитан при следующем вызове.
    fn next_frame(&mut self) -> ProtocolResult<Frame<'_>>;

    /// Статистика разбора
    fn stats(&self) -> &CodecStats;
}

/// Результат одного шага чтения потока.
#[derive(Debug)]
pub enum Frame<'a> {
    /// Кадр с выборками
    Samples(SampleFrame<'a>),
    /// Обновление параметров тюнера
    Meta(MetaUpdate),
    /// Таймаут опроса, новых данных нет
    Idle,
}

/// Кадр с выборками; `payload` заимствован из буфера кодека.
#[derive(Debug)]
pub struct SampleFrame<'a> {
    pub header: DataFrameHeader,
    pub format: SampleFormat,
    pub payload: &'a [u8],
    /// Сколько кадров пропущено перед этим (если был разрыв номеров)
    pub dropped: Option<u32>,
}

/// Статистика, накопленная кодеком за соединение.
#[derive(Debug, Default, Clone)]
pub struct CodecStats {
    /// Успешно прочитанных кадров с выборками.
    pub frames_ok: u64,
    /// Прочитанных META кадров.
    pub meta_frames: u64,
    /// Сумма `sample_count` по всем кадрам.
    pub samples: u64,
    /// Количество разрывов нумерации.
    pub gaps: u64,
    /// Суммарно пропущено кадров по разрывам.
    pub dropped_frames: u64,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Header,
    Payload(DataFrameHeader),
    MetaTail,
}

/// Что подготовил шаг разбора (без заимствования буферов).
enum Ready {
    Idle,
    Samples {
        header: DataFrameHeader,
        dropped: Option<u32>,
    },
    Meta(MetaUpdate),
}

/// Возобновляемая нарезка потока на кадры поверх [`ExactReader`].
struct Framer<R: Read> {
    reader: ExactReader<R>,
    order: ByteOrderKind,
    head: [u8; META_FRAME_SIZE],
    filled: usize,
    payload: Vec<u8>,
    stage: Stage,
    sequence: SequenceTracker,
    stats: CodecStats,
    format: Option<SampleFormat>,
}

impl<R: Read> Framer<R> {
    fn new(
        inner: R,
        order: ByteOrderKind,
        prefix: &[u8],
    ) -> Self {
        let mut head = [0u8; META_FRAME_SIZE];
        head[..prefix.len()].copy_from_slice(prefix);

        Self {
            reader: ExactReader::new(inner),
            order,
            head,
            filled: prefix.len(),
            payload: Vec::new(),
            stage: Stage::Header,
            sequence: SequenceTracker::new(),
            stats: CodecStats::default(),
            format: None,
        }
    }

    /// Читает заголовок потока длиной `len` целиком (таймаут = ошибка).
    fn read_stream_header(
        &mut self,
        len: usize,
    ) -> ProtocolResult<()> {
        let result = self.reader.fill(&mut self.head[..len], &mut self.filled);
        self.filled = 0;

        match result? {
            Fill::Complete => Ok(()),
            Fill::Pending => Err(ProtocolError::Timeout),
        }
    }

    fn start_stream(
        &mut self,
        format: SampleFormat,
    ) {
        self.format = Some(format);
        self.stage = Stage::Header;
        self.filled = 0;
        self.sequence.reset();
    }

    fn format(&self) -> ProtocolResult<SampleFormat> {
        self.format.ok_or_else(|| {
            ProtocolError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "handshake not performed",
            ))
        })
    }

    /// Дочитывает заголовок кадра. `None`, если истёк таймаут опроса.
    fn frame_head(&mut self) -> ProtocolResult<Option<u32>> {
        match self
            .reader
            .fill(&mut self.head[..FRAME_HEADER_SIZE], &mut self.filled)?
        {
            Fill::Pending => Ok(None),
            Fill::Complete => Ok(Some(magic_of(&self.head, self.order))),
        }
    }

    fn frame_header(&self) -> DataFrameHeader {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf.copy_from_slice(&self.head[..FRAME_HEADER_SIZE]);
        DataFrameHeader::decode(&buf, self.order)
    }

    fn begin_payload(
        &mut self,
        header: DataFrameHeader,
    ) -> ProtocolResult<()> {
        if header.sample_count > MAX_FRAME_SAMPLES {
            self.reset_stage();
            return Err(ProtocolError::FrameTooLarge {
                samples: header.sample_count,
                limit: MAX_FRAME_SAMPLES,
            });
        }

        let len = header.payload_len(self.format()?);

        self.payload.clear();
        if self.payload.try_reserve_exact(len).is_err() {
            self.reset_stage();
            return Err(ResourceError::AllocationFailed {
                what: "frame payload",
                bytes: len,
            }
            .into());
        }
        self.payload.resize(len, 0);

        self.filled = 0;
        self.stage = Stage::Payload(header);
        Ok(())
    }

    fn payload_step(
        &mut self,
        header: DataFrameHeader,
    ) -> ProtocolResult<Ready> {
        match self.reader.fill(&mut self.payload, &mut self.filled)? {
            Fill::Pending => Ok(Ready::Idle),
            Fill::Complete => {
                self.reset_stage();
                let dropped = self.sequence.observe(header.sequence);

                self.stats.frames_ok += 1;
                self.stats.samples += header.sample_count as u64;
                if let Some(n) = dropped {
                    self.stats.gaps += 1;
                    self.stats.dropped_frames += n as u64;
                }

                Ok(Ready::Samples { header, dropped })
            }
        }
    }

    fn reset_stage(&mut self) {
        self.stage = Stage::Header;
        self.filled = 0;
    }

    fn unknown_frame(
        &mut self,
        magic: u32,
    ) -> ProtocolError {
        warn!("Unknown frame magic: {magic:#010x} ('{}')", magic_tag(magic));
        self.reset_stage();
        ProtocolError::UnknownFrameType(magic)
    }

    fn into_frame(
        &self,
        ready: Ready,
    ) -> ProtocolResult<Frame<'_>> {
        Ok(match ready {
            Ready::Idle => Frame::Idle,
            Ready::Meta(meta) => Frame::Meta(meta),
            Ready::Samples { header, dropped } => Frame::Samples(SampleFrame {
                header,
                format: self.format()?,
                payload: &self.payload,
                dropped,
            }),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// PHXI / IQDQ / META
////////////////////////////////////////////////////////////////////////////////

/// Кодек PHXI потока.
pub struct PhxiCodec<R: Read> {
    framer: Framer<R>,
}

impl<R: Read> PhxiCodec<R> {
    pub fn new(
        inner: R,
        order: ByteOrderKind,
    ) -> Self {
        Self::with_prefix(inner, order, &[])
    }

    /// Кодек, для которого часть заголовка (магическое число) уже прочитана.
    pub fn with_prefix(
        inner: R,
        order: ByteOrderKind,
        prefix: &[u8],
    ) -> Self {
        Self {
            framer: Framer::new(inner, order, prefix),
        }
    }

    fn step(&mut self) -> ProtocolResult<Ready> {
        let f = &mut self.framer;

        loop {
            match f.stage {
                Stage::Header => {
                    let Some(magic) = f.frame_head()? else {
                        return Ok(Ready::Idle);
                    };

                    match magic {
                        MAGIC_IQDQ => {
                            let header = f.frame_header();
                            f.begin_payload(header)?;
                        }
                        // Первые 16 байт META уже в `head`, дочитываем хвост
                        MAGIC_META => f.stage = Stage::MetaTail,
                        other => return Err(f.unknown_frame(other)),
                    }
                }
                Stage::Payload(header) => return f.payload_step(header),
                Stage::MetaTail => {
                    let fill = f.reader.fill(&mut f.head[..META_FRAME_SIZE], &mut f.filled)?;
                    if fill == Fill::Pending {
                        return Ok(Ready::Idle);
                    }

                    f.reset_stage();
                    let meta = MetaUpdate::decode(&f.head, f.order)?;
                    f.stats.meta_frames += 1;

                    debug!(
                        "META update: seq={} center={} Hz gain={:.1} dB lna={}",
                        meta.sequence,
                        meta.center_freq,
                        meta.gain_reduction as f32 / 10.0,
                        meta.lna_enabled
                    );

                    return Ok(Ready::Meta(meta));
                }
            }
        }
    }
}

impl<R: Read + Send> StreamCodec for PhxiCodec<R> {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Phxi
    }

    fn handshake(&mut self) -> ProtocolResult<StreamInfo> {
        self.framer.read_stream_header(PHXI_HEADER_SIZE)?;

        let mut buf = [0u8; PHXI_HEADER_SIZE];
        buf.copy_from_slice(&self.framer.head[..PHXI_HEADER_SIZE]);
        let header = StreamHeader::decode(&buf, self.framer.order)?;

        self.framer.start_stream(header.sample_format);

        info!(
            "PHXI v{}: {} Hz {} I/Q stream, center={} Hz, gain reduction={:.1} dB, LNA={}",
            header.version,
            header.sample_rate,
            header.sample_format,
            header.center_freq,
            header.gain_reduction_db(),
            header.lna_enabled
        );

        Ok(StreamInfo::from_phxi(&header))
    }

    fn next_frame(&mut self) -> ProtocolResult<Frame<'_>> {
        self.framer.format()?;
        let ready = self.step()?;
        self.framer.into_frame(ready)
    }

    fn stats(&self) -> &CodecStats {
        &self.framer.stats
    }
}

////////////////////////////////////////////////////////////////////////////////
// FT32 / DATA
////////////////////////////////////////////////////////////////////////////////

/// Кодек упрощённого FT32 потока.
pub struct Ft32Codec<R: Read> {
    framer: Framer<R>,
}

impl<R: Read> Ft32Codec<R> {
    pub fn new(
        inner: R,
        order: ByteOrderKind,
    ) -> Self {
        Self::with_prefix(inner, order, &[])
    }

    pub fn with_prefix(
        inner: R,
        order: ByteOrderKind,
        prefix: &[u8],
    ) -> Self {
        Self {
            framer: Framer::new(inner, order, prefix),
        }
    }

    fn step(&mut self) -> ProtocolResult<Ready> {
        let f = &mut self.framer;

        loop {
            match f.stage {
                Stage::Header => {
                    let Some(magic) = f.frame_head()? else {
                        return Ok(Ready::Idle);
                    };

                    if magic != MAGIC_DATA {
                        return Err(f.unknown_frame(magic));
                    }

                    let header = f.frame_header();
                    f.begin_payload(header)?;
                }
                Stage::Payload(header) => return f.payload_step(header),
                // В FT32 нет META кадров
                Stage::MetaTail => f.reset_stage(),
            }
        }
    }
}

impl<R: Read + Send> StreamCodec for Ft32Codec<R> {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Ft32
    }

    fn handshake(&mut self) -> ProtocolResult<StreamInfo> {
        self.framer.read_stream_header(FT32_HEADER_SIZE)?;

        let mut buf = [0u8; FT32_HEADER_SIZE];
        buf.copy_from_slice(&self.framer.head[..FT32_HEADER_SIZE]);
        let sample_rate = decode_ft32_header(&buf, self.framer.order)?;

        self.framer.start_stream(SampleFormat::Float32);

        info!("FT32: {sample_rate} Hz F32 I/Q stream");

        Ok(StreamInfo::ft32(sample_rate))
    }

    fn next_frame(&mut self) -> ProtocolResult<Frame<'_>> {
        self.framer.format()?;
        let ready = self.step()?;
        self.framer.into_frame(ready)
    }

    fn stats(&self) -> &CodecStats {
        &self.framer.stats
    }
}

////////////////////////////////////////////////////////////////////////////////
// Выбор кодека
////////////////////////////////////////////////////////////////////////////////

/// Создаёт кодек нужного варианта и выполняет рукопожатие.
///
/// Для [`ProtocolKind::Auto`] вариант определяется по первому слову потока.
pub fn open_codec<R: Read + Send + 'static>(
    kind: ProtocolKind,
    inner: R,
    order: ByteOrderKind,
) -> ProtocolResult<(Box<dyn StreamCodec>, StreamInfo)> {
    let mut codec: Box<dyn StreamCodec> = match kind {
        ProtocolKind::Phxi => Box::new(PhxiCodec::new(inner, order)),
        ProtocolKind::Ft32 => Box::new(Ft32Codec::new(inner, order)),
        ProtocolKind::Auto => negotiate(inner, order)?,
    };

    let info = codec.handshake()?;

    Ok((codec, info))
}

fn negotiate<R: Read + Send + 'static>(
    inner: R,
    order: ByteOrderKind,
) -> ProtocolResult<Box<dyn StreamCodec>> {
    let mut reader = ExactReader::new(inner);
    let mut magic = [0u8; MAGIC_SIZE];

    reader.read_exact_or_timeout(&mut magic)?;
    let inner = reader.into_inner();

    match magic_of(&magic, order) {
        MAGIC_PHXI => Ok(Box::new(PhxiCodec::with_prefix(inner, order, &magic))),
        MAGIC_FT32 => Ok(Box::new(Ft32Codec::with_prefix(inner, order, &magic))),
        other => Err(ProtocolError::bad_magic(MAGIC_PHXI, other)),
    }
}
