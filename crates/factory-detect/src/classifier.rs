// factory-detect/src/classifier.rs
//
// ONNX defect classifier run through tract. The model file is parsed at
// load time; the optimised plan is built on the first region and reused.
use crate::{Classification, ConfigError, DetectError, Detector, Region, Result};
use factory_preprocess::{Preprocessor, Scale};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

type Plan = RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub model: PathBuf,
    /// Output index → label name. Missing names become `class<i>`.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    /// Model input width and height.
    #[serde(default = "default_input_size")]
    pub input_size: [u32; 2],
    /// Feed 0‑255 pixel values instead of 0‑1.
    #[serde(default = "default_raw_pixels")]
    pub raw_pixels: bool,
}

fn default_labels() -> Vec<String> {
    vec!["bad".to_string(), "good".to_string()]
}

fn default_input_size() -> [u32; 2] {
    [224, 224]
}

fn default_raw_pixels() -> bool {
    true
}

impl ClassifierSettings {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            labels: default_labels(),
            input_size: default_input_size(),
            raw_pixels: default_raw_pixels(),
        }
    }
}

pub struct ClassifierDetector {
    path: PathBuf,
    model: InferenceModel,
    plan: Option<Plan>,
    pre: Preprocessor,
    labels: Vec<String>,
}

impl ClassifierDetector {
    /// Parse the ONNX model. Fails with [`ConfigError`] when the file is
    /// missing or is not a loadable ONNX graph.
    pub fn load(settings: &ClassifierSettings) -> std::result::Result<Self, ConfigError> {
        let path = settings.model.clone();
        if !path.exists() {
            return Err(ConfigError::Missing(path.display().to_string()));
        }
        let model = tract_onnx::onnx()
            .model_for_path(&path)
            .map_err(|error| ConfigError::Model {
                path: path.display().to_string(),
                error,
            })?;
        let [w, h] = settings.input_size;
        if w == 0 || h == 0 {
            return Err(ConfigError::Invalid {
                path: path.display().to_string(),
                reason: format!("input size {w}x{h} is empty"),
            });
        }
        let scale = if settings.raw_pixels { Scale::Raw } else { Scale::Unit };
        info!("loaded classifier {}", path.display());

        Ok(Self {
            path,
            model,
            plan: None,
            pre: Preprocessor::new(w, h, scale),
            labels: settings.labels.clone(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.path
    }

    fn compile(&self) -> Result<Plan> {
        let (w, h) = self.pre.input_size();
        let plan = self
            .model
            .clone()
            .with_input_fact(0, f32::fact([1, 3, h as usize, w as usize]).into())?
            .into_optimized()?
            .into_runnable()?;
        debug!("compiled classifier plan for 1x3x{h}x{w}");
        Ok(plan)
    }

    fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class{index}"))
    }
}

impl Detector for ClassifierDetector {
    type Input = Region;
    type Output = Classification;

    fn detect(&mut self, region: &Region) -> Result<Option<Classification>> {
        let arr = self.pre.run(&region.image)?;
        let data: Vec<f32> = arr.iter().copied().collect();
        let tensor = Tensor::from_shape(arr.shape(), &data)?;

        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => self.compile()?,
        };
        let outputs = plan.run(tvec![tensor.into()]);
        self.plan = Some(plan);
        let outputs = outputs?;

        let view = outputs[0].to_array_view::<f32>()?;
        let shape = view.shape().to_vec();
        let batch_ok = shape.first().map(|b| *b == 1).unwrap_or(false);
        if !batch_ok || view.is_empty() {
            return Err(DetectError::InvalidOutputShape(shape));
        }

        let probs: Vec<f32> = view.iter().copied().collect();
        debug!("classifier probs for frame {}: {probs:?}", region.frame_seq);
        Ok(Some(Classification::ranked(
            probs.into_iter().enumerate().map(|(i, p)| (self.label(i), p)),
        )))
    }

    fn name(&self) -> &'static str {
        "classifier"
    }
}
