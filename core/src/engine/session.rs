//! TensorFlow-style sessions: feed a named tensor, fetch a named tensor.

use ndarray::ArrayD;
use std::path::Path;
use tract_onnx::prelude::{TValue, TVec};

use super::plan::{first_output, into_plan, optimize, parse_model, pin_input, to_tvalue, Plan};
use super::program::{ModelFormat, TensorData};
use crate::error::{MigxError, Result};

/// Strip TensorFlow import scoping from a tensor name.
///
/// `import/MobilenetV2/Predictions/Reshape_1:0` names output 0 of node
/// `MobilenetV2/Predictions/Reshape_1` inside the default `import` scope.
pub fn graph_node_name(tensor: &str) -> &str {
    let name = tensor.strip_prefix("import/").unwrap_or(tensor);
    match name.rsplit_once(':') {
        Some((node, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => node,
        _ => name,
    }
}

/// A frozen `GraphDef` prepared to evaluate one fetch from one feed.
pub struct Session {
    plan: Plan,
    feed: String,
    fetch: String,
    feed_shape: Vec<usize>,
}

impl Session {
    /// Load a frozen graph and resolve the feed and fetch tensors.
    pub fn load(
        path: impl AsRef<Path>,
        feed: &str,
        fetch: &str,
        feed_shape: &[usize],
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MigxError::FileNotFound(path.to_path_buf()));
        }
        let feed = graph_node_name(feed).to_string();
        let fetch = graph_node_name(fetch).to_string();

        let model = parse_model(path, ModelFormat::TfProtobuf)?
            .with_input_names([feed.as_str()])
            .and_then(|m| m.with_output_names([fetch.as_str()]))
            .map_err(|e| MigxError::model_load(format!("{:#}", e)))?;
        let model = pin_input(model, 0, feed_shape)?;
        let plan = into_plan(optimize(model)?)?;
        tracing::debug!("Session ready: feed {} {:?} -> fetch {}", feed, feed_shape, fetch);

        Ok(Self {
            plan,
            feed,
            fetch,
            feed_shape: feed_shape.to_vec(),
        })
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn fetch(&self) -> &str {
        &self.fetch
    }

    pub fn feed_shape(&self) -> &[usize] {
        &self.feed_shape
    }

    /// Evaluate the fetch tensor for one feed value.
    pub fn run(&self, value: &ArrayD<f32>) -> Result<TensorData> {
        if value.shape() != self.feed_shape.as_slice() {
            return Err(MigxError::tensor(format!(
                "Feed {} expects {:?}, got {:?}",
                self.feed,
                self.feed_shape,
                value.shape()
            )));
        }
        let mut inputs: TVec<TValue> = TVec::new();
        inputs.push(to_tvalue(value)?);
        let outputs = self
            .plan
            .run(inputs)
            .map_err(|e| MigxError::inference(format!("{:#}", e)))?;
        first_output(&outputs)
    }
}
