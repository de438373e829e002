#![allow(dead_code)]

use std::collections::HashMap;
use anyhow::{anyhow, bail, Result};
use ppyoloe_detect::{get_img_ratio, DType, InferenceSession, ResizeMode, Tensor, TensorInfo, TensorMuts, TensorRefs};

/// One raw prediction the mock writes into its output tensors.
#[derive(Debug, Clone, Copy)]
pub struct Raw {
    pub box_idx: usize,
    pub class_id: usize,
    pub score: f32,
    pub xyxy: [f32; 4],
}

impl Raw {
    pub fn new(box_idx: usize, class_id: usize, score: f32, xyxy: [f32; 4]) -> Self {
        Self { box_idx, class_id, score, xyxy }
    }
}

/// In-memory PP-YOLOE stand-in: `image` and `scale_factor` inputs,
/// class-major `scores` and `boxes` outputs.
///
/// Predictions are scripted per `(call, slot)`; everything else scores zero.
#[derive(Debug, Default)]
pub struct MockSession {
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
    pub classes: usize,
    pub boxes: usize,
    pub script: HashMap<(usize, usize), Vec<Raw>>,
    pub fail_on_call: Option<usize>,
    pub truncate_scores: bool,
    pub names: Option<String>,
    // observed
    pub calls: usize,
    pub ratios: Vec<Vec<f32>>,
    pub image_means: Vec<Vec<f32>>,
}

impl MockSession {
    pub fn new(batch: usize, net: usize, classes: usize, boxes: usize) -> Self {
        Self {
            inputs: vec![
                TensorInfo::new("image", &[batch, 3, net, net], DType::F32),
                TensorInfo::new("scale_factor", &[batch, 2], DType::F32),
            ],
            outputs: vec![
                TensorInfo::new("scores", &[batch, classes, boxes], DType::F32),
                TensorInfo::new("boxes", &[batch, boxes, 4], DType::F32),
            ],
            classes,
            boxes,
            ..Default::default()
        }
    }

    pub fn without_ratio_input(mut self) -> Self {
        self.inputs.truncate(1);
        self
    }

    pub fn with_raw(mut self, call: usize, slot: usize, raw: Raw) -> Self {
        self.script.entry((call, slot)).or_default().push(raw);
        self
    }

    pub fn with_names(mut self, names: &str) -> Self {
        self.names = Some(names.to_string());
        self
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }
}

impl InferenceSession for MockSession {
    fn graph_names(&self) -> Vec<String> {
        vec!["ppyoloe_mock".to_string()]
    }

    fn input_infos(&self) -> &[TensorInfo] {
        &self.inputs
    }

    fn output_infos(&self) -> &[TensorInfo] {
        &self.outputs
    }

    fn run(&mut self, inputs: &TensorRefs<'_>, outputs: &mut TensorMuts<'_>) -> Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on_call == Some(call) {
            bail!("device lost on call {call}");
        }

        let image = inputs.get("image").ok_or_else(|| anyhow!("no image input"))?;
        let batch = image.shape()[0];
        self.image_means
            .push((0..batch).map(|i| image.slot(i).mean().unwrap_or(0.)).collect());
        if let Some(ratio) = inputs.get("scale_factor") {
            self.ratios.push(ratio.iter().copied().collect());
        }

        let (nc, na) = (self.classes, self.boxes);
        let mut scores = vec![0f32; batch * nc * na];
        let mut coords = vec![0f32; batch * na * 4];
        for slot in 0..batch {
            for raw in self.script.get(&(call, slot)).into_iter().flatten() {
                scores[slot * nc * na + raw.class_id * na + raw.box_idx] = raw.score;
                let at = slot * na * 4 + raw.box_idx * 4;
                coords[at..at + 4].copy_from_slice(&raw.xyxy);
            }
        }

        let scores = if self.truncate_scores {
            Tensor::from(vec![0f32; 1])
        } else {
            Tensor::from_shape_vec(&[batch, nc, na], scores)?
        };
        if let Some(dst) = outputs.get_mut("scores") {
            **dst = scores;
        }
        if let Some(dst) = outputs.get_mut("boxes") {
            **dst = Tensor::from_shape_vec(&[batch, na, 4], coords)?;
        }
        Ok(())
    }

    fn metadata(&self, key: &str) -> Option<String> {
        match key {
            "names" => self.names.clone(),
            _ => None,
        }
    }
}

/// Network-space corners of the source-pixel box `(x, y, w, h)` after letterboxing.
pub fn letterboxed(src: (u32, u32), net: u32, xywh: [f32; 4]) -> [f32; 4] {
    let ratio = get_img_ratio(src.0, src.1, net, net, ResizeMode::Letterbox).unwrap();
    let (x1, y1) = ratio.to_network(xywh[0], xywh[1]);
    let (x2, y2) = ratio.to_network(xywh[0] + xywh[2], xywh[1] + xywh[3]);
    [x1, y1, x2, y2]
}

pub fn assert_close(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-3, "{a} != {b}");
}
