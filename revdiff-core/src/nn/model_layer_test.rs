use crate::error::RevDiffError;
use crate::graph::{NameResolver, Resolved};
use crate::nn::{InitScheme, ModelLayerBuilder};

#[test]
fn test_build_creates_zeroed_moments() {
    let layer = ModelLayerBuilder::new("dense")
        .add("W", &[3, 2], InitScheme::Xavier)
        .add("b", &[1, 2], InitScheme::Zeros)
        .with_seed(11)
        .build()
        .unwrap();

    assert_eq!(layer.name(), "dense");
    assert_eq!(layer.len(), 2);
    let keys: Vec<&str> = layer.elements().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["W", "b"]);

    let w = layer.element("W").unwrap();
    assert_eq!(w.shape(), &[3, 2]);
    assert_eq!(w.gradient().to_vec(), vec![0.0; 6]);
    assert_eq!(w.first_moment().to_vec(), vec![0.0; 6]);
    assert_eq!(w.second_moment().shape(), vec![3, 2]);
}

#[test]
fn test_same_seed_same_weights() {
    let build = || {
        ModelLayerBuilder::new("l")
            .add("W", &[4, 4], InitScheme::He)
            .with_seed(99)
            .build()
            .unwrap()
    };
    assert_eq!(build().weight("W").unwrap().to_vec(), build().weight("W").unwrap().to_vec());
}

#[test]
fn test_duplicate_and_unknown_keys() {
    let duplicate = ModelLayerBuilder::new("l")
        .add("W", &[1, 1], InitScheme::Zeros)
        .add("W", &[1, 1], InitScheme::Zeros)
        .build();
    assert!(matches!(duplicate, Err(RevDiffError::ConfigurationError(_))));

    let layer = ModelLayerBuilder::new("l")
        .add("W", &[1, 1], InitScheme::Zeros)
        .build()
        .unwrap();
    assert_eq!(
        layer.weight("V").unwrap_err(),
        RevDiffError::UnknownElement {
            layer: "l".to_string(),
            key: "V".to_string(),
        }
    );
}

#[test]
fn test_bind_into_shares_storage_and_zero_gradients() {
    let layer = ModelLayerBuilder::new("l")
        .add("W", &[1, 2], InitScheme::Constant(1.5))
        .build()
        .unwrap();
    let mut resolver = NameResolver::new();
    layer.bind_into(&mut resolver);

    let Some(Resolved::Value(weight)) = resolver.resolve("W", 0, None) else {
        panic!("W should resolve to a value");
    };
    assert!(weight.ptr_eq(&layer.weight("W").unwrap()));
    let Some(Resolved::Value(gradient)) = resolver.resolve("WGradient", 4, Some(2)) else {
        panic!("WGradient should resolve to a value");
    };

    gradient.fill(3.0);
    assert_eq!(layer.gradient("W").unwrap().to_vec(), vec![3.0, 3.0]);
    layer.zero_gradients();
    assert_eq!(gradient.to_vec(), vec![0.0, 0.0]);
}
