//! Conversion between gNMI paths and the flat `/`-delimited names the
//! stats backend understands.
//!
//! Element keys are not represented in the flat form and delimiters inside
//! element names are not escaped.

use crate::proto::{Path, PathElem};

pub fn encode(path: &Path) -> String {
    path.elem
        .iter()
        .fold(String::new(), |mut flat, elem| {
            flat.push('/');
            flat.push_str(&elem.name);
            flat
        })
}

pub fn decode(flat: &str) -> Path {
    Path {
        elem: flat
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|name| PathElem {
                name: name.into(),
                key: Default::default(),
            })
            .collect(),
        ..Default::default()
    }
}
