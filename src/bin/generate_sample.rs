use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BinaryArray, Int64Array, StringArray, StructArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use hound::{SampleFormat, WavSpec, WavWriter};
use parquet::arrow::ArrowWriter;

const SAMPLE_RATE: u32 = 16_000;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in [-1, 1)
    fn next_signed(&mut self) -> f32 {
        ((self.next_u64() >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
    }
}

/// Encode a noisy sine tone as 16-bit mono WAV.
fn sine_wav(frequency: f32, duration_ms: u32, rng: &mut SimpleRng) -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    let mut writer =
        WavWriter::new(Cursor::new(&mut bytes), spec).expect("Failed to start WAV stream");
    let frames = SAMPLE_RATE * duration_ms / 1000;
    for n in 0..frames {
        let t = n as f32 / SAMPLE_RATE as f32;
        let sample = 0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
            + 0.01 * rng.next_signed();
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
    bytes
}

fn main() {
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_audio.parquet".to_string());
    let mut rng = SimpleRng::new(42);

    let transcripts = [
        "what is the capital of france",
        "how many legs does a spider have",
        "",
        "name a primary colour",
        "who wrote hamlet",
        "what is two plus two",
    ];

    let mut ids = Vec::new();
    let mut payloads: Vec<Option<Vec<u8>>> = Vec::new();
    let mut paths = Vec::new();
    let mut texts = Vec::new();
    let mut rates = Vec::new();

    for (i, text) in transcripts.iter().enumerate() {
        ids.push(format!("q{i:03}"));
        // One row without audio to exercise the skip path.
        payloads.push(if i == 4 {
            None
        } else {
            Some(sine_wav(220.0 + 110.0 * i as f32, 250, &mut rng))
        });
        paths.push(format!("q{i:03}.wav"));
        texts.push(text.to_string());
        rates.push(SAMPLE_RATE as i64);
    }

    let audio_fields = vec![
        Arc::new(Field::new("bytes", DataType::Binary, true)),
        Arc::new(Field::new("path", DataType::Utf8, true)),
    ];
    let audio = StructArray::from(vec![
        (
            audio_fields[0].clone(),
            Arc::new(BinaryArray::from(
                payloads.iter().map(|p| p.as_deref()).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
        (
            audio_fields[1].clone(),
            Arc::new(StringArray::from(paths)) as ArrayRef,
        ),
    ]);

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("audio", audio.data_type().clone(), false),
        Field::new("transcript", DataType::Utf8, false),
        Field::new("sampling_rate", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(ids)) as ArrayRef,
            Arc::new(audio),
            Arc::new(StringArray::from(texts)),
            Arc::new(Int64Array::from(rates)),
        ],
    )
    .expect("Failed to create RecordBatch");

    let file = std::fs::File::create(&output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} rows ({} Hz mono WAV payloads) to {output_path}",
        transcripts.len(),
        SAMPLE_RATE
    );
}
