use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClinicId(pub i64);

impl std::fmt::Display for ClinicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dental clinic as the recommendation core sees it.
///
/// Rows are created and mutated by admin tooling only; the engine reads them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: ClinicId,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub district: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub has_parking: bool,
    pub night_service: bool,
    pub weekend_service: bool,
}

impl Clinic {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_require_both_components() {
        let mut clinic = Clinic {
            id: ClinicId(1),
            name: "서울밝은치과".to_owned(),
            address: "서울 강남구 테헤란로 1".to_owned(),
            phone: "02-555-0001".to_owned(),
            district: "강남구".to_owned(),
            latitude: Some(37.5173),
            longitude: None,
            has_parking: false,
            night_service: false,
            weekend_service: false,
        };
        assert_eq!(clinic.coordinates(), None);

        clinic.longitude = Some(127.0473);
        assert_eq!(clinic.coordinates(), Some((37.5173, 127.0473)));
    }
}
