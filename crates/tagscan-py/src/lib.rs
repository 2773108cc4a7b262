use ::tagscan::apriltag::AprilTagBackend;
use ::tagscan::{
    DetectorConfig, HostArray, OutputMatrix, PixelType, TagDetector, TagScanError as ScanError,
};
use log::LevelFilter;
use numpy::ndarray::{Array2, ArrayViewD, ShapeBuilder};
use numpy::{
    dtype, PyArray2, PyArrayDescrMethods, PyReadonlyArrayDyn, PyUntypedArray,
    PyUntypedArrayMethods,
};
use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyTuple};
use serde_json::{Map, Number, Value};

create_exception!(tagscan, TagScanError, PyException, "Base class of tagscan errors.");
create_exception!(tagscan, InvalidArgumentCount, TagScanError);
create_exception!(tagscan, UnsupportedDimensionality, TagScanError);
create_exception!(tagscan, UnsupportedPixelType, TagScanError);
create_exception!(tagscan, TooManyOutputsRequested, TagScanError);
create_exception!(tagscan, InvalidRasterGeometry, TagScanError);
create_exception!(tagscan, InvalidConfig, TagScanError);
create_exception!(tagscan, AllocationFailure, TagScanError);
create_exception!(tagscan, DetectionBackendFailure, TagScanError);

fn to_py_err(err: ScanError) -> PyErr {
    let message = format!("{}: {err}", err.identifier());
    match err {
        ScanError::InvalidArgumentCount { .. } => InvalidArgumentCount::new_err(message),
        ScanError::UnsupportedDimensionality { .. } => UnsupportedDimensionality::new_err(message),
        ScanError::UnsupportedPixelType { .. } => UnsupportedPixelType::new_err(message),
        ScanError::TooManyOutputsRequested { .. } => TooManyOutputsRequested::new_err(message),
        ScanError::InvalidRasterGeometry { .. } => InvalidRasterGeometry::new_err(message),
        ScanError::InvalidConfig { .. } => InvalidConfig::new_err(message),
        ScanError::AllocationFailure { .. } => AllocationFailure::new_err(message),
        ScanError::DetectionBackendFailure { .. } => DetectionBackendFailure::new_err(message),
    }
}

fn scalar_to_json(value: &Bound<'_, PyAny>) -> PyResult<Value> {
    if value.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(value.extract::<bool>()?));
    }
    if let Ok(v) = value.extract::<i64>() {
        return Ok(Value::Number(v.into()));
    }
    if let Ok(v) = value.extract::<f64>() {
        return Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| InvalidConfig::new_err("tagscan:config: non-finite value"));
    }
    if let Ok(v) = value.extract::<String>() {
        return Ok(Value::String(v));
    }
    Err(PyTypeError::new_err("config values must be bool, int, float or str"))
}

/// Build a configuration from dict overrides on top of the defaults.
fn config_from_dict(dict: &Bound<'_, PyDict>) -> PyResult<DetectorConfig> {
    let mut map = Map::with_capacity(dict.len());
    for (key, value) in dict.iter() {
        let key: String = key
            .extract()
            .map_err(|_| PyTypeError::new_err("config keys must be strings"))?;
        map.insert(key, scalar_to_json(&value)?);
    }
    DetectorConfig::from_json(&Value::Object(map).to_string()).map_err(to_py_err)
}

fn pixel_type_of(py: Python<'_>, array: &Bound<'_, PyUntypedArray>) -> PixelType {
    let descr = array.dtype();
    let known = [
        (dtype::<u8>(py), PixelType::U8),
        (dtype::<i8>(py), PixelType::I8),
        (dtype::<u16>(py), PixelType::U16),
        (dtype::<i16>(py), PixelType::I16),
        (dtype::<u32>(py), PixelType::U32),
        (dtype::<i32>(py), PixelType::I32),
        (dtype::<u64>(py), PixelType::U64),
        (dtype::<i64>(py), PixelType::I64),
        (dtype::<f32>(py), PixelType::F32),
        (dtype::<f64>(py), PixelType::F64),
        (dtype::<bool>(py), PixelType::Bool),
    ];
    known
        .into_iter()
        .find(|(d, _)| descr.is_equiv_to(d))
        .map(|(_, t)| t)
        .unwrap_or(PixelType::Other)
}

/// Row-major copy of `view`, or `None` when its memory is already C-ordered
/// and can be borrowed as is. Fortran-ordered, transposed and strided views
/// are copied in logical order.
fn row_major_copy(view: ArrayViewD<'_, u8>) -> Option<Vec<u8>> {
    if view.is_standard_layout() {
        None
    } else {
        Some(view.iter().copied().collect())
    }
}

enum Pixels<'py> {
    Unused,
    Borrowed(PyReadonlyArrayDyn<'py, u8>),
    Owned(Vec<u8>),
}

/// A positional argument kept alive (and borrowed) for the whole call.
struct HeldArg<'py> {
    shape: Vec<usize>,
    pixel_type: PixelType,
    pixels: Pixels<'py>,
}

impl HeldArg<'_> {
    fn host_array(&self) -> HostArray<'_> {
        let data: &[u8] = match &self.pixels {
            Pixels::Unused => &[],
            Pixels::Borrowed(array) => array.as_slice().unwrap_or(&[]),
            Pixels::Owned(bytes) => bytes,
        };
        HostArray::new(self.shape.clone(), self.pixel_type, data)
    }
}

fn hold_arg<'py>(py: Python<'py>, arg: &Bound<'py, PyAny>) -> PyResult<HeldArg<'py>> {
    let Ok(array) = arg.extract::<Bound<'py, PyUntypedArray>>() else {
        // Not an ndarray: described as a 0-d value of unknown type.
        return Ok(HeldArg {
            shape: Vec::new(),
            pixel_type: PixelType::Other,
            pixels: Pixels::Unused,
        });
    };
    let shape = array.shape().to_vec();
    let pixel_type = pixel_type_of(py, &array);

    let pixels = if pixel_type == PixelType::U8 && shape.len() == 2 {
        let readonly: PyReadonlyArrayDyn<'py, u8> = arg.extract()?;
        match row_major_copy(readonly.as_array()) {
            None => Pixels::Borrowed(readonly),
            Some(bytes) => Pixels::Owned(bytes),
        }
    } else {
        Pixels::Unused
    };

    Ok(HeldArg {
        shape,
        pixel_type,
        pixels,
    })
}

fn matrix_to_py(py: Python<'_>, matrix: OutputMatrix) -> PyResult<Bound<'_, PyAny>> {
    let shape = (matrix.rows(), matrix.cols()).f();
    let array = Array2::from_shape_vec(shape, matrix.into_vec()).map_err(|_| {
        to_py_err(ScanError::AllocationFailure {
            what: "output array",
        })
    })?;
    Ok(PyArray2::from_owned_array(py, array).into_any())
}

/// Detect AprilTags (tag36h11) in one 2-D uint8 image.
///
/// Returns `max(1, nout)` float64 arrays in the order id (1xN), center (2xN),
/// corner_1 .. corner_4 (2xN). A single array is returned when `nout <= 1`.
#[pyfunction]
#[pyo3(signature = (*args, nout = 1, config = None))]
fn detect<'py>(
    py: Python<'py>,
    args: &Bound<'py, PyTuple>,
    nout: usize,
    config: Option<&Bound<'py, PyDict>>,
) -> PyResult<Bound<'py, PyAny>> {
    let config = match config {
        Some(dict) => config_from_dict(dict)?,
        None => DetectorConfig::default(),
    };

    let held = args
        .iter()
        .map(|arg| hold_arg(py, &arg))
        .collect::<PyResult<Vec<_>>>()?;
    let inputs: Vec<HostArray<'_>> = held.iter().map(HeldArg::host_array).collect();

    let detector = TagDetector::new(AprilTagBackend, config).map_err(to_py_err)?;
    let outputs = py
        .detach(|| detector.call(&inputs, nout))
        .map_err(to_py_err)?;

    let mut arrays = outputs
        .into_positional()
        .into_iter()
        .map(|(_, matrix)| matrix_to_py(py, matrix))
        .collect::<PyResult<Vec<_>>>()?;
    if arrays.len() == 1 {
        return Ok(arrays.remove(0));
    }
    Ok(PyTuple::new(py, arrays)?.into_any())
}

/// Default detector configuration as a dict.
#[pyfunction]
fn default_config(py: Python<'_>) -> PyResult<Bound<'_, PyDict>> {
    let value = serde_json::to_value(DetectorConfig::default())
        .map_err(|err| PyTypeError::new_err(err.to_string()))?;
    let dict = PyDict::new(py);
    if let Value::Object(map) = value {
        for (key, item) in map {
            match item {
                Value::Bool(b) => dict.set_item(key, b)?,
                Value::Number(n) => match n.as_i64() {
                    Some(i) => dict.set_item(key, i)?,
                    None => dict.set_item(key, n.as_f64().unwrap_or(f64::NAN))?,
                },
                Value::String(s) => dict.set_item(key, s)?,
                _ => {}
            }
        }
    }
    Ok(dict)
}

#[pymodule]
#[pyo3(name = "tagscan")]
fn tagscan_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    let level = ::tagscan::core::level_from_env(LevelFilter::Warn);
    let _ = ::tagscan::core::init_with_level(level);

    m.add_function(wrap_pyfunction!(detect, m)?)?;
    m.add_function(wrap_pyfunction!(default_config, m)?)?;
    m.add("TagScanError", py.get_type::<TagScanError>())?;
    m.add("InvalidArgumentCount", py.get_type::<InvalidArgumentCount>())?;
    m.add(
        "UnsupportedDimensionality",
        py.get_type::<UnsupportedDimensionality>(),
    )?;
    m.add("UnsupportedPixelType", py.get_type::<UnsupportedPixelType>())?;
    m.add(
        "TooManyOutputsRequested",
        py.get_type::<TooManyOutputsRequested>(),
    )?;
    m.add("InvalidRasterGeometry", py.get_type::<InvalidRasterGeometry>())?;
    m.add("InvalidConfig", py.get_type::<InvalidConfig>())?;
    m.add("AllocationFailure", py.get_type::<AllocationFailure>())?;
    m.add(
        "DetectionBackendFailure",
        py.get_type::<DetectionBackendFailure>(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_order_is_borrowed() {
        let img = Array2::from_shape_vec((2, 3), vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(row_major_copy(img.view().into_dyn()), None);
    }

    #[test]
    fn fortran_order_is_copied_row_by_row() {
        // [[1, 2, 3], [4, 5, 6]] stored column by column
        let img = Array2::from_shape_vec((2, 3).f(), vec![1u8, 4, 2, 5, 3, 6]).unwrap();
        assert_eq!(img[[0, 1]], 2);
        assert_eq!(row_major_copy(img.view().into_dyn()), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn transposed_view_is_copied_row_by_row() {
        let img = Array2::from_shape_vec((3, 2), vec![1u8, 4, 2, 5, 3, 6]).unwrap();
        assert_eq!(row_major_copy(img.t().into_dyn()), Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn reversed_rows_are_copied() {
        let img = Array2::from_shape_vec((2, 2), vec![1u8, 2, 3, 4]).unwrap();
        let flipped = img.slice(numpy::ndarray::s![..;-1, ..]);
        assert_eq!(row_major_copy(flipped.into_dyn()), Some(vec![3, 4, 1, 2]));
    }
}
