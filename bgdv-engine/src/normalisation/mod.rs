//! Normalisation of raw parameter readings
//!
//! Only number parameters are normalised. Parameters are independent of each
//! other, so a geometry is normalised in parallel.

pub mod measure;
pub mod number;

use bgdv_common::{BikeGeometry, GeometryParameter};
use rayon::prelude::*;
use tracing::info;

pub use number::normalise_number;

/// Normalise every parameter of a geometry in place
pub fn normalise_bike_geometry(geometry: &mut BikeGeometry) {
    let mut parameters: Vec<&mut GeometryParameter> = geometry.parameters_mut().collect();
    parameters
        .par_iter_mut()
        .for_each(|parameter| normalise_parameter(parameter));

    info!("BikeGeometry normalised");
}

/// Normalise one parameter in place (text parameters are left alone)
pub fn normalise_parameter(parameter: &mut GeometryParameter) {
    if parameter.is_number() {
        normalise_number(parameter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdv_common::{ParameterValue, ReferenceData};
    use std::sync::Arc;

    #[test]
    fn test_normalise_bike_geometry() {
        let mut bike = BikeGeometry::from_parameter_map(
            [
                ("axle_spacing", "135/110"),
                ("head_tube", "A 190,1aa$"),
                ("wheelbase", "39.92 / 1014"),
                ("slug", "bike-135/110"),
                ("reach", ""),
            ],
            Arc::new(ReferenceData::builtin()),
        );

        normalise_bike_geometry(&mut bike);

        assert_eq!(
            bike.get_parameter_value("axle_spacing"),
            Some(ParameterValue::Range(vec![135.0, 110.0]))
        );
        assert_eq!(bike.get_parameter_value("head_tube"), Some(ParameterValue::Number(190.1)));
        assert_eq!(bike.get_parameter_value("wheelbase"), Some(ParameterValue::Number(1014.0)));
        assert_eq!(
            bike.get_parameter_value("slug"),
            Some(ParameterValue::Text("bike-135/110".to_string()))
        );
        assert_eq!(bike.get_parameter_value("reach"), None);
    }
}
