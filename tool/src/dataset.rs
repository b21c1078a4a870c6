use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use log::info;
use tensor::{DType, Tensor};

use crate::{DatasetConfig, Result, ToolErr};

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Tensor> {
    let path = path.as_ref();
    let tensor = comms::read_tensor(BufReader::new(File::open(path)?))?;
    info!(path:? = path, shape:? = tensor.shape(), dtype:? = tensor.dtype(); "tensor loaded");
    Ok(tensor)
}

pub fn write_file<P: AsRef<Path>>(path: P, tensor: &Tensor) -> Result<()> {
    comms::write_tensor(BufWriter::new(File::create(path)?), tensor)?;
    Ok(())
}

/// Keeps the first `limit` samples, never copies.
fn limit(tensor: Tensor, limit: Option<usize>) -> Result<Tensor> {
    match (limit, tensor.shape().first()) {
        (Some(limit), Some(&samples)) if limit < samples => Ok(tensor.narrow(0, 0, limit)?),
        _ => Ok(tensor),
    }
}

fn scale(tensor: Tensor, divisor: Option<f64>) -> Result<Tensor> {
    let Some(divisor) = divisor else {
        return Ok(tensor);
    };

    if tensor.dtype().is_float() {
        Ok(tensor.div_scalar(divisor)?)
    } else {
        Ok(tensor.cast(DType::F32)?.div_scalar(divisor)?)
    }
}

impl DatasetConfig {
    /// Reads the features and labels, applying the sample limit to both and
    /// the scale to the features only.
    pub fn load(&self) -> Result<(Tensor, Option<Tensor>)> {
        let x = limit(read_file(&self.x)?, self.limit)?;
        let x = scale(x, self.scale)?;

        let y = match &self.y {
            Some(path) => Some(limit(read_file(path)?, self.limit)?),
            None => None,
        };

        Ok((x, y))
    }
}

fn argmax(row: impl Iterator<Item = f64>) -> usize {
    row.enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
        .0
}

/// The class of sample `i`, either the argmax of a one hot row or the
/// stored class index.
fn class_of(labels: &Tensor, i: usize) -> Result<usize> {
    match labels.shape() {
        [_, classes] if *classes > 1 => {
            let row = (0..*classes)
                .map(|c| labels.get_element_as_float(&[i, c]))
                .collect::<tensor::Result<Vec<_>>>()?;
            Ok(argmax(row.into_iter()))
        }
        [_, _] => Ok(labels.get_element_as_float(&[i, 0])? as usize),
        _ => Ok(labels.get_element_as_float(&[i])? as usize),
    }
}

/// The fraction of samples whose highest scoring class in `predictions`
/// matches `labels`.
///
/// # Arguments
/// * `predictions` - `[samples, classes]` scores.
/// * `labels` - Either one hot `[samples, classes]` or class indices of
///   shape `[samples]` or `[samples, 1]`.
pub fn accuracy(predictions: &Tensor, labels: &Tensor) -> Result<f64> {
    let samples = predictions.shape().first().copied().unwrap_or(0);
    let expected = labels.shape().first().copied().unwrap_or(0);
    if samples != expected {
        return Err(ToolErr::LabelMismatch {
            predictions: samples,
            labels: expected,
        });
    }

    if samples == 0 {
        return Ok(0.0);
    }

    let classes = predictions.shape().get(1).copied().unwrap_or(1);
    let mut hits = 0;
    for i in 0..samples {
        let row = (0..classes)
            .map(|c| predictions.get_element_as_float(&[i, c]))
            .collect::<tensor::Result<Vec<_>>>()?;

        if argmax(row.into_iter()) == class_of(labels, i)? {
            hits += 1;
        }
    }

    Ok(hits as f64 / samples as f64)
}

#[cfg(test)]
mod tests {
    use std::{env, fs, process};

    use super::*;

    fn scores() -> Tensor {
        Tensor::from_slice(&[4, 3], &[
            0.1f32, 0.8, 0.1, //
            0.7, 0.2, 0.1, //
            0.2, 0.3, 0.5, //
            0.4, 0.5, 0.1, //
        ])
        .unwrap()
    }

    #[test]
    fn accuracy_with_one_hot_labels() {
        let labels = Tensor::from_slice(&[4, 3], &[
            0u8, 1, 0, //
            1, 0, 0, //
            0, 0, 1, //
            1, 0, 0, //
        ])
        .unwrap();

        assert_eq!(accuracy(&scores(), &labels).unwrap(), 0.75);
    }

    #[test]
    fn accuracy_with_class_indices() {
        let labels = Tensor::from_slice(&[4], &[1i32, 0, 2, 1]).unwrap();
        assert_eq!(accuracy(&scores(), &labels).unwrap(), 1.0);

        let column = Tensor::from_slice(&[4, 1], &[0i32, 0, 0, 0]).unwrap();
        assert_eq!(accuracy(&scores(), &column).unwrap(), 0.25);
    }

    #[test]
    fn accuracy_needs_matching_samples() {
        let labels = Tensor::from_slice(&[2], &[1i32, 0]).unwrap();
        assert!(matches!(
            accuracy(&scores(), &labels),
            Err(ToolErr::LabelMismatch {
                predictions: 4,
                labels: 2
            })
        ));
    }

    #[test]
    fn load_limits_and_scales() {
        let dir = env::temp_dir().join(format!("engine-run-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();

        let x = Tensor::from_slice(&[3, 2], &[0u8, 255, 51, 102, 153, 204]).unwrap();
        let y = Tensor::from_slice(&[3], &[0i32, 1, 2]).unwrap();
        write_file(dir.join("x.tnsr"), &x).unwrap();
        write_file(dir.join("y.tnsr"), &y).unwrap();

        let config = DatasetConfig {
            x: dir.join("x.tnsr"),
            y: Some(dir.join("y.tnsr")),
            scale: Some(255.0),
            limit: Some(2),
        };
        let (x, y) = config.load().unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(x.dtype(), DType::F32);
        assert_eq!(x.to_vec::<f32>().unwrap(), [0.0, 1.0, 0.2, 0.4]);
        assert_eq!(y.unwrap().to_vec::<i32>().unwrap(), [0, 1]);
    }
}
