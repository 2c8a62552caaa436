use bgdv_common::parameter::format_number;
use bgdv_common::{GeometryParameter, ParameterType};
use proptest::prelude::*;

proptest! {
    #[test]
    fn confidence_always_within_unit_interval(
        updates in proptest::collection::vec((-10.0f64..10.0, any::<bool>()), 1..20),
    ) {
        let mut parameter = GeometryParameter::new("reach", Some("371"), ParameterType::Number);

        for (confidence, force) in updates {
            parameter.set_confidence(confidence, force);
            let current = parameter.confidence().unwrap();
            prop_assert!((0.0..=1.0).contains(&current));
        }
    }

    #[test]
    fn calculated_value_is_write_once(first in 1.0f64..5000.0, second in 1.0f64..5000.0) {
        let mut parameter = GeometryParameter::new("wheelbase", None, ParameterType::Number);
        parameter.set_calculated_value(first, true).unwrap();
        parameter.set_calculated_value(second, true).unwrap();

        prop_assert_eq!(parameter.value().and_then(|v| v.as_number()), Some(first));
    }

    #[test]
    fn formatted_numbers_parse_back(value in -1.0e6f64..1.0e6) {
        let text = format_number(value);
        prop_assert!(!text.ends_with('.'));
        prop_assert!(!(text.contains('.') && text.ends_with('0')));
        prop_assert_eq!(text.parse::<f64>().unwrap(), value);
    }
}
