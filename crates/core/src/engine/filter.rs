//! Filter stage: district match, optional radius cut, review-count floor,
//! and the soft treatment partition.

use std::collections::{HashMap, HashSet};

use crate::domain::clinic::{Clinic, ClinicId};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lon) pairs in kilometers.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// A clinic that survived filtering, with everything ranking needs later.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub clinic: Clinic,
    pub review_count: u32,
    pub distance_km: Option<f64>,
    /// False when a treatment was requested and the clinic has no price
    /// observation for it; breaks composite ties only.
    pub has_treatment_price: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterStage {
    pub min_reviews: u32,
    pub search_radius_km: f64,
}

impl FilterStage {
    /// Apply the filter stages: district, radius, review floor, then the
    /// soft treatment partition. `review_counts` carries
    /// processed review counts; absent clinics count zero.
    /// `clinics_with_price` is consulted only when `treatment_requested`.
    pub fn apply(
        &self,
        clinics: Vec<Clinic>,
        query_district: &str,
        user_location: Option<(f64, f64)>,
        review_counts: &HashMap<ClinicId, u32>,
        treatment_requested: bool,
        clinics_with_price: &HashSet<ClinicId>,
    ) -> Vec<Candidate> {
        let needle = query_district.trim().to_lowercase();

        let mut survivors: Vec<Candidate> = clinics
            .into_iter()
            .filter(|clinic| clinic.district.to_lowercase().contains(&needle))
            .filter_map(|clinic| {
                let distance_km = match (user_location, clinic.coordinates()) {
                    (Some(user), Some(here)) => {
                        let distance = haversine_km(user, here);
                        // Closed interval: exactly at the radius is in.
                        if distance > self.search_radius_km {
                            return None;
                        }
                        Some(distance)
                    }
                    // A located user drops clinics without coordinates.
                    (Some(_), None) => return None,
                    (None, _) => None,
                };

                let review_count = review_counts.get(&clinic.id).copied().unwrap_or(0);
                if review_count < self.min_reviews {
                    return None;
                }

                Some(Candidate {
                    has_treatment_price: !treatment_requested
                        || clinics_with_price.contains(&clinic.id),
                    clinic,
                    review_count,
                    distance_km,
                })
            })
            .collect();

        if treatment_requested {
            // Soft filter: stable partition, price-data clinics first.
            survivors.sort_by_key(|candidate| !candidate.has_treatment_price);
        }

        survivors
    }
}
