use std::collections::BTreeMap;

use bytes::BufMut;

use crate::{Deserialize, PROGRESS_KIND, Result, Serialize, WireErr, codec};

/// Named metric values attached to a progress record, e.g. `loss`, `acc`
/// and `nsamples`.
pub type Metrics = BTreeMap<String, f64>;

/// The lifecycle event a progress record reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    TrainingBegin,
    TrainingEnd,
    EpochBegin,
    EpochEnd,
    BatchBegin,
    BatchEnd,
}

impl ProgressKind {
    fn tag(self) -> u8 {
        match self {
            ProgressKind::TrainingBegin => 0,
            ProgressKind::TrainingEnd => 1,
            ProgressKind::EpochBegin => 2,
            ProgressKind::EpochEnd => 3,
            ProgressKind::BatchBegin => 4,
            ProgressKind::BatchEnd => 5,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        let kind = match tag {
            0 => ProgressKind::TrainingBegin,
            1 => ProgressKind::TrainingEnd,
            2 => ProgressKind::EpochBegin,
            3 => ProgressKind::EpochEnd,
            4 => ProgressKind::BatchBegin,
            5 => ProgressKind::BatchEnd,
            tag => {
                return Err(WireErr::UnknownTag {
                    context: "progress kind",
                    tag,
                });
            }
        };

        Ok(kind)
    }
}

/// One event emitted by the engine while a call is in flight.
///
/// | header: u32 | kind: u8 | index: u32 | n: u16 | n * (name_len: u16 | name | value: f64) |
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub kind: ProgressKind,
    /// The epoch or batch ordinal, zero for training begin and end.
    pub index: u32,
    pub metrics: Metrics,
}

impl ProgressRecord {
    pub fn new(kind: ProgressKind, index: u32) -> Self {
        Self {
            kind,
            index,
            metrics: Metrics::new(),
        }
    }

    /// Adds a metric to the record, builder style.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_owned(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        Self::deserialize(&mut bytes)
    }
}

impl Serialize for ProgressRecord {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u32(PROGRESS_KIND);
        buf.put_u8(self.kind.tag());
        buf.put_u32(self.index);

        let n = u16::try_from(self.metrics.len()).map_err(|_| WireErr::FieldTooLong {
            field: "metrics",
            len: self.metrics.len(),
            max: u16::MAX as usize,
        })?;
        buf.put_u16(n);

        for (name, &value) in &self.metrics {
            let name_len = u16::try_from(name.len()).map_err(|_| WireErr::FieldTooLong {
                field: "metric name",
                len: name.len(),
                max: u16::MAX as usize,
            })?;
            buf.put_u16(name_len);
            buf.put_slice(name.as_bytes());
            buf.put_f64(value);
        }

        Ok(())
    }
}

impl Deserialize for ProgressRecord {
    fn deserialize(buf: &mut &[u8]) -> Result<Self> {
        codec::expect_kind(buf, PROGRESS_KIND)?;

        let kind = ProgressKind::from_tag(codec::get_u8(buf, "progress kind")?)?;
        let index = codec::get_u32(buf, "progress index")?;
        let n = codec::get_u16(buf, "metric count")?;

        let mut metrics = Metrics::new();
        for _ in 0..n {
            let len = codec::get_u16(buf, "metric name")? as usize;
            let name = codec::get_slice(buf, len, "metric name")?;
            let name = str::from_utf8(name).map_err(|_| WireErr::InvalidUtf8 {
                field: "metric name",
            })?;

            let value = codec::get_f64(buf, "metric value")?;
            metrics.insert(name.to_owned(), value);
        }

        if !buf.is_empty() {
            return Err(WireErr::TrailingBytes(buf.len()));
        }

        Ok(Self {
            kind,
            index,
            metrics,
        })
    }
}
