//! Explanation generator: deterministic Korean prose from a scored clinic.

use crate::domain::recommendation::RankedClinic;

const STRENGTH_CUTOFF: f64 = 75.0;
const LOW_RISK_CUTOFF: f64 = 25.0;
const REVIEW_VOLUME_CUTOFF: u32 = 50;

/// Assemble the justification paragraph from fixed templates. Output is a
/// pure function of the scored clinic; no randomness.
pub fn explain(clinic: &RankedClinic) -> String {
    let mut sentences: Vec<String> = Vec::new();

    if clinic.composite_score >= 80.0 {
        sentences.push("종합적으로 매우 우수한 치과입니다".to_owned());
    } else if clinic.composite_score >= 70.0 {
        sentences.push("전반적으로 좋은 평가를 받는 치과입니다".to_owned());
    } else if clinic.composite_score >= 60.0 {
        sentences.push("평균 이상의 서비스를 제공하는 치과입니다".to_owned());
    }

    let mut strengths: Vec<&str> = Vec::new();
    if clinic.price_competitiveness >= STRENGTH_CUTOFF {
        strengths.push("가격이 합리적");
    }
    if clinic.medical_skill >= STRENGTH_CUTOFF {
        strengths.push("의료진 실력이 우수");
    }
    if clinic.overtreatment_risk <= LOW_RISK_CUTOFF {
        strengths.push("과잉진료 위험이 낮음");
    }
    if clinic.patient_satisfaction >= STRENGTH_CUTOFF {
        strengths.push("환자 만족도가 높음");
    }
    if !strengths.is_empty() {
        sentences.push(format!("특히 {}으로 평가받고 있습니다", strengths.join(", ")));
    }

    let mut amenities: Vec<&str> = Vec::new();
    if clinic.has_parking {
        amenities.push("주차 가능");
    }
    if clinic.night_service {
        amenities.push("야간 진료");
    }
    if clinic.weekend_service {
        amenities.push("주말 진료");
    }
    if !amenities.is_empty() {
        sentences.push(format!("{} 서비스를 제공합니다", amenities.join(", ")));
    }

    if clinic.review_count >= REVIEW_VOLUME_CUTOFF {
        sentences.push(format!(
            "풍부한 리뷰 데이터({}개)를 바탕으로 분석되었습니다",
            clinic.review_count
        ));
    }

    if sentences.is_empty() {
        // Always say something, even for an unremarkable mid-pack clinic.
        sentences.push("분석된 리뷰 데이터를 바탕으로 추천되었습니다".to_owned());
    }

    format!("{}.", sentences.join(". "))
}

#[cfg(test)]
mod tests {
    use crate::domain::clinic::ClinicId;

    use super::*;

    fn scored(composite: f64) -> RankedClinic {
        RankedClinic {
            clinic_id: ClinicId(1),
            clinic_name: "서울밝은치과".to_owned(),
            clinic_address: "서울 강남구 테헤란로 1".to_owned(),
            clinic_phone: "02-555-0001".to_owned(),
            district: "강남구".to_owned(),
            composite_score: composite,
            price_competitiveness: 50.0,
            medical_skill: 50.0,
            overtreatment_risk: 50.0,
            patient_satisfaction: 50.0,
            review_count: 12,
            distance_km: None,
            has_parking: false,
            night_service: false,
            weekend_service: false,
            explanation: String::new(),
        }
    }

    #[test]
    fn tier_phrase_tracks_composite_score() {
        assert!(explain(&scored(85.0)).contains("매우 우수한"));
        assert!(explain(&scored(72.0)).contains("좋은 평가"));
        assert!(explain(&scored(63.0)).contains("평균 이상"));
        assert!(!explain(&scored(55.0)).contains("평균 이상"));
    }

    #[test]
    fn strengths_listed_at_cutoffs() {
        let mut clinic = scored(82.0);
        clinic.price_competitiveness = 75.0;
        clinic.overtreatment_risk = 25.0;
        let text = explain(&clinic);
        assert!(text.contains("가격이 합리적"));
        assert!(text.contains("과잉진료 위험이 낮음"));
        assert!(!text.contains("의료진 실력이 우수"));
    }

    #[test]
    fn amenities_and_review_volume_phrases() {
        let mut clinic = scored(50.0);
        clinic.has_parking = true;
        clinic.weekend_service = true;
        clinic.review_count = 64;
        let text = explain(&clinic);
        assert!(text.contains("주차 가능, 주말 진료 서비스를 제공합니다"));
        assert!(text.contains("풍부한 리뷰 데이터(64개)"));
    }

    #[test]
    fn unremarkable_clinic_still_gets_a_sentence() {
        let text = explain(&scored(55.0));
        assert_eq!(text, "분석된 리뷰 데이터를 바탕으로 추천되었습니다.");
    }

    #[test]
    fn output_is_deterministic() {
        let clinic = scored(85.0);
        assert_eq!(explain(&clinic), explain(&clinic));
    }
}
