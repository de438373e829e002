use std::sync::Arc;
use std::time::{Duration, Instant};
use image::RgbImage;
use parking_lot::Mutex;
use rayon::prelude::*;
use crate::common::{BoxList, BoxSpace, DetectorConfig};
use crate::data::{Tensor, TensorInfo, TensorMuts, TensorRefs, TimeStamp};
use crate::detection_runners::{
    nms, BoxDecoder, ConvertParams, FirConverter, ImagePreprocessor, InferenceSession, TensorConverter,
};
use crate::error::DetectError;
use crate::utils::{load_class_names, parse_names_metadata, placeholder_names};

/// Host-side tensors bound to the model's inputs and outputs.
///
/// Allocated once for the model batch size and reused by every call.
#[derive(Debug)]
struct IoTensors {
    image_name: String,
    ratio_name: Option<String>,
    score_name: String,
    coord_name: String,
    image: Tensor,
    ratio: Option<Tensor>,
    scores: Tensor,
    coords: Tensor,
    max_batch: usize,
    net_height: u32,
    net_width: u32,
    num_boxes: usize,
    /// Per-image element count of the score output.
    score_len: usize,
}

impl IoTensors {
    fn coord_len(&self) -> usize {
        self.num_boxes * 4
    }
}

/// PP-YOLOE detector: preprocess, inference, decode and NMS over one session.
///
/// A detector owns its session and tensors; calls on one instance are
/// sequential. Independent instances may run on separate threads.
/// The session call is blocking and has no timeout.
pub struct Detector<S: InferenceSession, C: TensorConverter = FirConverter> {
    session: S,
    converter: C,
    config: DetectorConfig,
    names: Vec<String>,
    io: IoTensors,
    preprocessor: ImagePreprocessor,
    decoder: BoxDecoder,
    profile: Option<Arc<Mutex<TimeStamp>>>,
}

impl<S: InferenceSession> Detector<S, FirConverter> {
    pub fn new(session: S, config: DetectorConfig) -> Result<Self, DetectError> {
        Self::with_converter(session, FirConverter::default(), config)
    }
}

impl<S: InferenceSession, C: TensorConverter> Detector<S, C> {
    /// Validates `config` against the session's I/O, loads class names and
    /// allocates the batch tensors. Runs `config.num_dry_run` warm-up passes.
    pub fn with_converter(session: S, converter: C, config: DetectorConfig) -> Result<Self, DetectError> {
        config.validate()?;

        let io = Self::bind_io(&session, &config)?;
        let names = Self::resolve_names(&session, &config)?;

        let preprocessor = ImagePreprocessor {
            net_width: io.net_width,
            net_height: io.net_height,
            max_batch: io.max_batch,
            resize_mode: config.resize_mode,
            params: ConvertParams {
                ab: config.normalization.affine(),
                pad_value: config.pad_value,
            },
        };
        let decoder = BoxDecoder {
            conf_threshold: config.conf_threshold,
            num_classes: config.class_num,
            encoding: config.box_encoding,
            layout: config.score_layout,
            space: config.box_space,
        };

        log::info!(
            "Detector ready | Graphs: {:?} | Input: {}x{} | Batch: {} | Boxes: {} | Classes: {}",
            session.graph_names(),
            io.net_width,
            io.net_height,
            io.max_batch,
            io.num_boxes,
            config.class_num,
        );
        log::info!("Detector config:\n{}", config);

        let num_dry_run = config.num_dry_run;
        let mut detector = Self {
            session,
            converter,
            config,
            names,
            io,
            preprocessor,
            decoder,
            profile: None,
        };
        detector.warm_up(num_dry_run)?;
        Ok(detector)
    }

    fn bind_io(session: &S, config: &DetectorConfig) -> Result<IoTensors, DetectError> {
        let inputs = session.input_infos();
        let outputs = session.output_infos();

        let image_info = inputs
            .iter()
            .find(|x| x.shape.len() == 4 && x.shape[1] == 3)
            .ok_or_else(|| {
                DetectError::ModelShape(format!(
                    "no [batch, 3, height, width] image input among {:?}",
                    inputs.iter().map(|x| (&x.name, &x.shape)).collect::<Vec<_>>()
                ))
            })?;

        let (net_height, net_width) = (image_info.shape[2], image_info.shape[3]);
        if net_height == 0 || net_width == 0 {
            return Err(DetectError::ModelShape(format!(
                "image input `{}` has dynamic spatial dims {:?}",
                image_info.name, image_info.shape
            )));
        }

        let max_batch = match image_info.shape[0] {
            0 => {
                log::warn!("Image input `{}` has a dynamic batch dim, using 1", image_info.name);
                1
            }
            n => n,
        };

        let mut ratio_name = None;
        for info in inputs.iter().filter(|x| x.name != image_info.name) {
            let batch_ok = info.shape.first().map_or(false, |&b| b == 0 || b == max_batch);
            if info.shape.len() == 2 && info.shape[1] == 2 && batch_ok && ratio_name.is_none() {
                ratio_name = Some(info.name.clone());
            } else {
                return Err(DetectError::ModelShape(format!(
                    "unexpected input `{}` with shape {:?}",
                    info.name, info.shape
                )));
            }
        }
        if ratio_name.is_none() && config.box_space == BoxSpace::Image {
            log::warn!("Boxes are configured in image space but the model takes no ratio input");
        }
        if let (Some(name), BoxSpace::Network) = (&ratio_name, config.box_space) {
            log::warn!(
                "Model takes ratio input `{}` but boxes are decoded from network space; \
                if the export divides by it, configure BoxSpace::Image",
                name
            );
        }

        let (score_info, coord_info) = Self::identify_outputs(outputs)?;
        for info in [score_info, coord_info] {
            if info.shape[0] != 0 && info.shape[0] != max_batch {
                return Err(DetectError::ModelShape(format!(
                    "output `{}` batch dim {} differs from input batch {}",
                    info.name, info.shape[0], max_batch
                )));
            }
            if info.shape[1..].iter().any(|&d| d == 0) {
                return Err(DetectError::ModelShape(format!(
                    "output `{}` has dynamic dims {:?}",
                    info.name, info.shape
                )));
            }
        }

        let num_boxes = coord_info.shape[1];
        let (classes, boxes) = config
            .score_layout
            .classes_and_boxes(&score_info.shape[1..])
            .ok_or_else(|| DetectError::ModelShape(format!("score output shape {:?}", score_info.shape)))?;
        if boxes != num_boxes {
            return Err(DetectError::ModelShape(format!(
                "score output `{}` covers {} boxes, coordinate output `{}` covers {}",
                score_info.name, boxes, coord_info.name, num_boxes
            )));
        }
        if classes != config.class_num {
            return Err(DetectError::ModelShape(format!(
                "model predicts {} classes, configured class count is {}",
                classes, config.class_num
            )));
        }

        let mut score_shape = score_info.shape.clone();
        score_shape[0] = max_batch;

        Ok(IoTensors {
            image_name: image_info.name.clone(),
            ratio: ratio_name.as_ref().map(|_| {
                let mut x = Tensor::zeros(&[max_batch, 2]);
                x.fill(1.);
                x
            }),
            ratio_name,
            score_name: score_info.name.clone(),
            coord_name: coord_info.name.clone(),
            image: Tensor::zeros(&[max_batch, 3, net_height, net_width]),
            scores: Tensor::zeros(&score_shape),
            coords: Tensor::zeros(&[max_batch, num_boxes, 4]),
            max_batch,
            net_height: net_height as u32,
            net_width: net_width as u32,
            num_boxes,
            score_len: score_info.shape[1] * score_info.shape[2],
        })
    }

    /// Returns `(scores, coordinates)`. The coordinate output is the 3-D one
    /// ending in 4; when both qualify the declared order decides.
    fn identify_outputs(outputs: &[TensorInfo]) -> Result<(&TensorInfo, &TensorInfo), DetectError> {
        let [a, b] = outputs else {
            return Err(DetectError::ModelShape(format!(
                "expected a score and a coordinate output, got {} outputs",
                outputs.len()
            )));
        };
        if a.shape.len() != 3 || b.shape.len() != 3 {
            return Err(DetectError::ModelShape(format!(
                "outputs `{}` {:?} and `{}` {:?} are not 3-D",
                a.name, a.shape, b.name, b.shape
            )));
        }
        match (a.shape[2] == 4, b.shape[2] == 4) {
            (true, false) => Ok((b, a)),
            (_, true) => Ok((a, b)),
            (false, false) => Err(DetectError::ModelShape(format!(
                "no [batch, boxes, 4] coordinate output among `{}` {:?} and `{}` {:?}",
                a.name, a.shape, b.name, b.shape
            ))),
        }
    }

    // file > configured list > model metadata > placeholders
    fn resolve_names(session: &S, config: &DetectorConfig) -> Result<Vec<String>, DetectError> {
        let names = if let Some(path) = &config.class_names_file {
            load_class_names(path)?
        } else if let Some(names) = &config.class_names {
            names.clone()
        } else {
            match session.metadata("names").map(|x| parse_names_metadata(&x)) {
                Some(names) if !names.is_empty() => names,
                _ => placeholder_names(config.class_num),
            }
        };

        if names.len() != config.class_num {
            log::warn!(
                "Loaded {} class names for {} classes, labels may be off",
                names.len(),
                config.class_num
            );
        }
        Ok(names)
    }

    /// Detects objects in every image, processing `batch_size()` images per
    /// inference. Returns one [`BoxList`] per image, in input order.
    ///
    /// On error nothing is returned, even if earlier chunks succeeded.
    pub fn detect(&mut self, images: &[RgbImage]) -> Result<Vec<BoxList>, DetectError> {
        let t = Instant::now();
        let mut results = Vec::with_capacity(images.len());
        for (i, chunk) in images.chunks(self.io.max_batch).enumerate() {
            let offset = i * self.io.max_batch;
            let ys = self.detect_batch(chunk).map_err(|err| match err {
                DetectError::MalformedImage { index, width, height } => DetectError::MalformedImage {
                    index: index + offset,
                    width,
                    height,
                },
                err => err,
            })?;
            results.extend(ys);
        }
        self.record("detect", t.elapsed());
        Ok(results)
    }

    /// Appends one [`BoxList`] per image to `out`. `out` is left untouched on error.
    pub fn detect_into(&mut self, images: &[RgbImage], out: &mut Vec<BoxList>) -> Result<(), DetectError> {
        let ys = self.detect(images)?;
        out.extend(ys);
        Ok(())
    }

    fn detect_batch(&mut self, images: &[RgbImage]) -> Result<Vec<BoxList>, DetectError> {
        let t = Instant::now();
        let ratios = self.preprocessor.process(
            &self.converter,
            images,
            &mut self.io.image,
            self.io.ratio.as_mut(),
        )?;
        self.record("preprocess", t.elapsed());

        let t = Instant::now();
        self.infer()?;
        self.record("inference", t.elapsed());

        let t = Instant::now();
        let (score_len, coord_len) = (self.io.score_len, self.io.coord_len());
        let scores = self.io.scores.as_slice().unwrap_or_default();
        let coords = self.io.coords.as_slice().unwrap_or_default();
        let decoder = &self.decoder;
        let num_boxes = self.io.num_boxes;
        let mut ys: Vec<BoxList> = ratios
            .par_iter()
            .enumerate()
            .map(|(i, ratio)| {
                decoder.decode(
                    &scores[i * score_len..(i + 1) * score_len],
                    &coords[i * coord_len..(i + 1) * coord_len],
                    num_boxes,
                    ratio,
                )
            })
            .collect();
        self.record("decode", t.elapsed());

        let t = Instant::now();
        let candidates: usize = ys.iter().map(Vec::len).sum();
        let iou_threshold = self.config.nms_threshold;
        ys.par_iter_mut().for_each(|boxes| nms(boxes, iou_threshold));
        self.record("nms", t.elapsed());

        log::debug!(
            "Batch of {} | {} candidates | {} kept",
            images.len(),
            candidates,
            ys.iter().map(Vec::len).sum::<usize>()
        );
        Ok(ys)
    }

    /// Runs the session over the bound tensors and checks what came back.
    fn infer(&mut self) -> Result<(), DetectError> {
        let io = &mut self.io;
        {
            let mut inputs = TensorRefs::new();
            inputs.insert(io.image_name.as_str(), &io.image);
            if let (Some(name), Some(ratio)) = (&io.ratio_name, &io.ratio) {
                inputs.insert(name.as_str(), ratio);
            }
            let mut outputs = TensorMuts::new();
            outputs.insert(io.score_name.as_str(), &mut io.scores);
            outputs.insert(io.coord_name.as_str(), &mut io.coords);

            self.session.run(&inputs, &mut outputs).map_err(DetectError::Session)?;
        }

        let expected_scores = io.max_batch * io.score_len;
        let expected_coords = io.max_batch * io.coord_len();
        for (name, tensor, expected) in [
            (&io.score_name, &mut io.scores, expected_scores),
            (&io.coord_name, &mut io.coords, expected_coords),
        ] {
            if tensor.len() != expected {
                return Err(DetectError::OutputShape {
                    name: name.clone(),
                    got: tensor.len(),
                    expected,
                });
            }
            if !tensor.is_standard_layout() {
                let x = tensor.as_standard_layout().into_owned();
                *tensor = Tensor::from(x);
            }
        }
        Ok(())
    }

    /// Runs `n` inferences on the current (blank when fresh) input tensors.
    pub fn warm_up(&mut self, n: usize) -> Result<(), DetectError> {
        for _ in 0..n {
            let t = Instant::now();
            self.infer()?;
            log::debug!("Dry run: {:.2?}", t.elapsed());
        }
        Ok(())
    }

    fn record(&self, stage: &str, x: Duration) {
        log::trace!("{stage}: {x:.2?}");
        if let Some(profile) = &self.profile {
            profile.lock().record(stage, x);
        }
    }

    /// Attaches a profiling sink. Purely observational.
    pub fn enable_profile(&mut self, ts: Arc<Mutex<TimeStamp>>) {
        self.profile = Some(ts);
    }

    pub fn disable_profile(&mut self) {
        self.profile = None;
    }

    /// Number of images the model processes per inference.
    pub fn batch_size(&self) -> usize {
        self.io.max_batch
    }

    /// `(width, height)` of the network input.
    pub fn net_size(&self) -> (u32, u32) {
        (self.io.net_width, self.io.net_height)
    }

    pub fn num_boxes(&self) -> usize {
        self.io.num_boxes
    }

    pub fn class_num(&self) -> usize {
        self.config.class_num
    }

    pub fn class_names(&self) -> &[String] {
        &self.names
    }

    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn graph_names(&self) -> Vec<String> {
        self.session.graph_names()
    }

    pub fn input_infos(&self) -> &[TensorInfo] {
        self.session.input_infos()
    }

    pub fn output_infos(&self) -> &[TensorInfo] {
        self.session.output_infos()
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}
