use iqfall_core::normalize_into;
use iqfall_types::{ByteOrderKind, IqSample, ResourceError, SampleFormat};
use log::{debug, info};

use crate::{
    accumulator::IqRing,
    agc::GainState,
    analyzer::SpectralAnalyzer,
    compositor::WaterfallBuffer,
    decimator::IqDecimator,
    try_alloc, DISPLAY_SAMPLE_RATE, FFT_SIZE, UPDATE_THRESHOLD, ZOOM_MAX_HZ,
};

/// Владеющий контекст конвейера: всё состояние обработки от сырых выборок
/// до пикселей водопада.
#[derive(Debug)]
pub struct WaterfallPipeline {
    decimator: IqDecimator,
    ring: IqRing,
    analyzer: SpectralAnalyzer,
    gain: GainState,
    waterfall: WaterfallBuffer,
    magnitudes: Vec<f32>,
    window: Vec<IqSample>,
    normalized: Vec<f32>,
    gain_offset_db: f32,
    source_rate: u32,
    rows: u64,
}

impl WaterfallPipeline {
    pub fn new(
        width: usize,
        height: usize,
    ) -> Result<Self, ResourceError> {
        let waterfall = WaterfallBuffer::new(width, height)?;

        Ok(Self {
            decimator: IqDecimator::new(1),
            ring: IqRing::new(FFT_SIZE, UPDATE_THRESHOLD)?,
            analyzer: SpectralAnalyzer::new(FFT_SIZE, DISPLAY_SAMPLE_RATE as f32, ZOOM_MAX_HZ)?,
            gain: GainState::new(),
            magnitudes: try_alloc("column magnitudes", waterfall.width(), 0.0f32)?,
            window: try_alloc("FFT input", FFT_SIZE, IqSample::ZERO)?,
            normalized: Vec::new(),
            waterfall,
            gain_offset_db: 0.0,
            source_rate: DISPLAY_SAMPLE_RATE,
            rows: 0,
        })
    }

    /// Настраивает конвейер на новый поток: пересчитывает коэффициент
    /// децимации и сбрасывает накопленные выборки. Состояние АРУ
    /// сохраняется.
    pub fn configure_stream(
        &mut self,
        sample_rate: u32,
    ) {
        self.decimator = IqDecimator::for_rates(sample_rate, DISPLAY_SAMPLE_RATE);
        self.ring.clear();
        self.source_rate = sample_rate;

        if self.decimator.is_active() {
            info!(
                "Decimating {} Hz → {} Hz (ratio {})",
                sample_rate,
                DISPLAY_SAMPLE_RATE,
                self.decimator.ratio()
            );
        } else {
            debug!("No decimation for {sample_rate} Hz source");
        }
    }

    /// Нормирует полезную нагрузку кадра и прогоняет её через дециматор в
    /// кольцевой буфер. Возвращает число выборок, попавших в буфер.
    pub fn ingest(
        &mut self,
        format: SampleFormat,
        order: ByteOrderKind,
        payload: &[u8],
    ) -> usize {
        let mut normalized = std::mem::take(&mut self.normalized);
        normalize_into(format, order, payload, &mut normalized);

        let mut pushed = 0;
        for pair in normalized.chunks_exact(2) {
            if self.push_raw(IqSample::new(pair[0], pair[1])) {
                pushed += 1;
            }
        }

        self.normalized = normalized;
        pushed
    }

    /// Выборка на частоте источника (проходит через дециматор).
    #[inline]
    pub fn push_raw(
        &mut self,
        sample: IqSample,
    ) -> bool {
        match self.decimator.process(sample) {
            Some(s) => {
                self.ring.push(s);
                true
            }
            None => false,
        }
    }

    /// Выборка уже на частоте отображения (тестовый сигнал).
    #[inline]
    pub fn push_iq(
        &mut self,
        sample: IqSample,
    ) {
        self.ring.push(sample);
    }

    /// Если накопилось достаточно новых выборок, выполняет
    /// спектр → АРУ → отрисовку строки. Возвращает `true`, если строка
    /// добавлена.
    pub fn process_if_ready(&mut self) -> bool {
        if !self.ring.ready() {
            return false;
        }

        self.ring.reset_new_count();
        self.ring.snapshot_into(&mut self.window);

        self.analyzer.analyze(&self.window);
        self.analyzer.map_columns(&mut self.magnitudes);
        self.gain.update(&self.magnitudes);
        self.waterfall
            .scroll_and_draw(&self.magnitudes, &self.gain, self.gain_offset_db);

        self.rows += 1;
        true
    }

    /// Новый размер окна. При ошибке выделения прежние буферы сохраняются.
    pub fn resize(
        &mut self,
        width: usize,
        height: usize,
    ) -> Result<(), ResourceError> {
        let waterfall = WaterfallBuffer::new(width, height)?;
        let magnitudes = try_alloc("column magnitudes", waterfall.width(), 0.0f32)?;

        debug!("Waterfall resized to {}x{}", waterfall.width(), waterfall.height());

        self.waterfall = waterfall;
        self.magnitudes = magnitudes;
        Ok(())
    }

    pub fn set_gain_offset(
        &mut self,
        db: f32,
    ) {
        self.gain_offset_db = db;
    }

    pub fn gain_offset(&self) -> f32 {
        self.gain_offset_db
    }

    pub fn waterfall(&self) -> &WaterfallBuffer {
        &self.waterfall
    }

    pub fn gain_state(&self) -> &GainState {
        &self.gain
    }

    /// Амплитуды последнего кадра спектра по столбцам.
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }

    pub fn decimation_ratio(&self) -> u32 {
        self.decimator.ratio()
    }

    pub fn dropped_pairs(&self) -> u64 {
        self.decimator.dropped_pairs()
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Сколько строк спектра нарисовано.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}
