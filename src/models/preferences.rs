use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use super::profile::{
    normalize_key, AgeRange, BedroomPersonality, BodyType, Ethnicity, Gender, GeoPoint, HairColor,
    HairLength, HealthCondition, Intelligence, LifestyleHabit, Looks, MeetingPlace, Profile,
    SexualActivity, DEFAULT_MAX_AGE, DEFAULT_MIN_AGE,
};

/// Errors raised while normalizing a stored row into a [`Profile`]
#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("profile age {0} is below the minimum of 18")]
    Underage(i64),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// One independently settable "want" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PreferenceTag {
    Gender(Gender),
    Body(BodyType),
    Ethnicity(Ethnicity),
    HairColor(HairColor),
    HairLength(HairLength),
    Looks(Looks),
    Intelligence(Intelligence),
    Bedroom(BedroomPersonality),
    Activity(SexualActivity),
    Meeting(MeetingPlace),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceCategory {
    Gender,
    Body,
    Ethnicity,
    HairColor,
    HairLength,
    Looks,
    Intelligence,
    Bedroom,
    Activity,
    Meeting,
}

impl PreferenceTag {
    pub fn category(&self) -> PreferenceCategory {
        match self {
            PreferenceTag::Gender(_) => PreferenceCategory::Gender,
            PreferenceTag::Body(_) => PreferenceCategory::Body,
            PreferenceTag::Ethnicity(_) => PreferenceCategory::Ethnicity,
            PreferenceTag::HairColor(_) => PreferenceCategory::HairColor,
            PreferenceTag::HairLength(_) => PreferenceCategory::HairLength,
            PreferenceTag::Looks(_) => PreferenceCategory::Looks,
            PreferenceTag::Intelligence(_) => PreferenceCategory::Intelligence,
            PreferenceTag::Bedroom(_) => PreferenceCategory::Bedroom,
            PreferenceTag::Activity(_) => PreferenceCategory::Activity,
            PreferenceTag::Meeting(_) => PreferenceCategory::Meeting,
        }
    }

    /// Parse a legacy flag column name such as `b_wantGenderWoman` or
    /// `b_whereMyPlace`.
    pub fn from_flag_key(key: &str) -> Option<Self> {
        let key = normalize_key(key);

        if let Some(rest) = key.strip_prefix("bwhere") {
            return MeetingPlace::parse(rest).map(PreferenceTag::Meeting);
        }

        let rest = key.strip_prefix("bwant")?;
        if let Some(v) = rest.strip_prefix("gender") {
            return Gender::parse(v).map(PreferenceTag::Gender);
        }
        if let Some(v) = rest.strip_prefix("body") {
            return BodyType::parse(v).map(PreferenceTag::Body);
        }
        if let Some(v) = rest.strip_prefix("ethnicity") {
            return Ethnicity::parse(v).map(PreferenceTag::Ethnicity);
        }
        if let Some(v) = rest.strip_prefix("haircolor") {
            return HairColor::parse(v).map(PreferenceTag::HairColor);
        }
        if let Some(v) = rest.strip_prefix("hairlength") {
            return HairLength::parse(v).map(PreferenceTag::HairLength);
        }
        if let Some(v) = rest.strip_prefix("looks") {
            return Looks::parse(v).map(PreferenceTag::Looks);
        }
        if let Some(v) = rest.strip_prefix("intelligence") {
            return Intelligence::parse(v).map(PreferenceTag::Intelligence);
        }
        if let Some(v) = rest.strip_prefix("bedroompersonality") {
            return BedroomPersonality::parse(v).map(PreferenceTag::Bedroom);
        }
        SexualActivity::parse(rest).map(PreferenceTag::Activity)
    }
}

/// The set of "want" flags a user has switched on. Anything absent is not
/// wanted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    tags: BTreeSet<PreferenceTag>,
}

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: PreferenceTag) -> bool {
        self.tags.insert(tag)
    }

    pub fn with(mut self, tag: PreferenceTag) -> Self {
        self.tags.insert(tag);
        self
    }

    #[inline]
    pub fn wants(&self, tag: PreferenceTag) -> bool {
        self.tags.contains(&tag)
    }

    #[inline]
    pub fn wants_gender(&self, gender: Gender) -> bool {
        self.wants(PreferenceTag::Gender(gender))
    }

    #[inline]
    pub fn wants_activity(&self, activity: SexualActivity) -> bool {
        self.wants(PreferenceTag::Activity(activity))
    }

    /// Whether any flag of the given category is set.
    pub fn has_category(&self, category: PreferenceCategory) -> bool {
        self.tags.iter().any(|t| t.category() == category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreferenceTag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<PreferenceTag> for Preferences {
    fn from_iter<I: IntoIterator<Item = PreferenceTag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

/// Loosely typed flag value as stored (`true`, `1`, `"1"`, `"yes"` ...).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FlagValue {
    pub fn is_set(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(i) => *i != 0,
            FlagValue::Float(f) => *f != 0.0,
            FlagValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on" | "y"
            ),
        }
    }
}

/// Legacy column names for each lifestyle habit: (practices, rejects).
const LIFESTYLE_FLAG_KEYS: [(LifestyleHabit, &str, &str); 6] = [
    (LifestyleHabit::Cigarettes, "b_smokeCigarettes", "b_noCigs"),
    (LifestyleHabit::HeavyDrinking, "b_heavyDrinker", "b_noHeavyDrink"),
    (LifestyleHabit::Marijuana, "b_smokeMarijuana", "b_noMarijuana"),
    (LifestyleHabit::OtherDrugs, "b_otherDrugs", "b_noDrugs"),
    (LifestyleHabit::Polyamory, "b_poly", "b_noPoly"),
    (LifestyleHabit::MarriedSecret, "b_marriedSecret", "b_noMarriedSecret"),
];

/// Raw profile row as handed over by a store, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub user_id: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub body: Option<String>,
    pub ethnicity: Option<String>,
    pub hair_color: Option<String>,
    pub hair_length: Option<String>,
    pub overall_looks: Option<String>,
    pub intelligence: Option<String>,
    pub bedroom_personality: Option<String>,
    pub want_age_from: Option<i64>,
    pub want_age_to: Option<i64>,
    pub max_distance_km: Option<f64>,
    pub interests: Option<String>,
    pub current_venue_id: Option<String>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub public_text: Option<String>,
    pub private_text: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub flags: HashMap<String, FlagValue>,
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = ProfileError;

    fn try_from(record: ProfileRecord) -> Result<Self, Self::Error> {
        if record.user_id.trim().is_empty() {
            return Err(ProfileError::MissingField("user_id"));
        }

        let raw_age = record.age.ok_or(ProfileError::MissingField("age"))?;
        if raw_age < i64::from(DEFAULT_MIN_AGE) {
            return Err(ProfileError::Underage(raw_age));
        }
        let age = u8::try_from(raw_age).map_err(|_| ProfileError::InvalidValue {
            field: "age",
            value: raw_age.to_string(),
        })?;

        let raw_gender = record.gender.ok_or(ProfileError::MissingField("gender"))?;
        let gender = Gender::parse(&raw_gender).ok_or(ProfileError::InvalidValue {
            field: "gender",
            value: raw_gender.clone(),
        })?;

        let mut profile = Profile::new(record.user_id, age, gender);

        profile.location = match (record.latitude, record.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(GeoPoint::new(lat, lon))
            }
            _ => None,
        };

        profile.body_type = parse_attribute(record.body.as_deref(), BodyType::parse);
        profile.ethnicity = parse_attribute(record.ethnicity.as_deref(), Ethnicity::parse);
        profile.hair_color = parse_attribute(record.hair_color.as_deref(), HairColor::parse);
        profile.hair_length = parse_attribute(record.hair_length.as_deref(), HairLength::parse);
        profile.looks = parse_attribute(record.overall_looks.as_deref(), Looks::parse);
        profile.intelligence = parse_attribute(record.intelligence.as_deref(), Intelligence::parse);
        profile.bedroom_personality = parse_attribute(
            record.bedroom_personality.as_deref(),
            BedroomPersonality::parse,
        );

        profile.age_range = AgeRange::new(
            clamp_age(record.want_age_from, DEFAULT_MIN_AGE),
            clamp_age(record.want_age_to, DEFAULT_MAX_AGE),
        );
        profile.max_distance_km = record
            .max_distance_km
            .filter(|d| d.is_finite() && *d > 0.0);
        profile.interests = record
            .interests
            .as_deref()
            .map(parse_interests)
            .unwrap_or_default();

        profile.current_venue_id = record
            .current_venue_id
            .filter(|v| !v.trim().is_empty());
        profile.last_active_at = record.last_active_at;
        profile.created_at = record.created_at;

        profile.has_public_bio = is_present(record.public_text.as_deref());
        profile.has_private_bio = is_present(record.private_text.as_deref());
        profile.has_avatar = is_present(record.avatar_url.as_deref());

        apply_flags(&mut profile, &record.flags);

        Ok(profile)
    }
}

fn apply_flags(profile: &mut Profile, flags: &HashMap<String, FlagValue>) {
    for (key, value) in flags {
        if !value.is_set() {
            continue;
        }

        if let Some(tag) = PreferenceTag::from_flag_key(key) {
            profile.wants.insert(tag);
            continue;
        }

        let normalized = normalize_key(key);

        if let Some(condition) = normalized
            .strip_prefix("bhave")
            .and_then(HealthCondition::parse)
        {
            profile.health.has.insert(condition);
            continue;
        }
        if let Some(condition) = normalized.strip_prefix("bno").and_then(parse_rejected_condition) {
            profile.health.rejects.insert(condition);
            continue;
        }

        if let Some((habit, rejects)) = lifestyle_flag(&normalized) {
            if rejects {
                profile.lifestyle.rejects.insert(habit);
            } else {
                profile.lifestyle.practices.insert(habit);
            }
            continue;
        }

        tracing::trace!("Ignoring unknown flag {} for {}", key, profile.user_id);
    }
}

fn parse_rejected_condition(rest: &str) -> Option<HealthCondition> {
    HealthCondition::parse(rest).or_else(|| (rest == "otherstis").then_some(HealthCondition::OtherSti))
}

fn lifestyle_flag(normalized_key: &str) -> Option<(LifestyleHabit, bool)> {
    LIFESTYLE_FLAG_KEYS
        .iter()
        .find_map(|(habit, practice, reject)| {
            if normalize_key(practice) == normalized_key {
                Some((*habit, false))
            } else if normalize_key(reject) == normalized_key {
                Some((*habit, true))
            } else {
                None
            }
        })
}

fn parse_attribute<T>(raw: Option<&str>, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = parse(raw);
    if parsed.is_none() {
        tracing::trace!("Unrecognized attribute value: {}", raw);
    }
    parsed
}

fn clamp_age(raw: Option<i64>, default: u8) -> u8 {
    raw.map(|a| a.clamp(i64::from(DEFAULT_MIN_AGE), i64::from(u8::MAX)) as u8)
        .unwrap_or(default)
}

fn is_present(raw: Option<&str>) -> bool {
    raw.map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Split a free-text, comma-separated interest list into trimmed,
/// lower-cased, de-duplicated entries.
pub fn parse_interests(raw: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, age: i64, gender: &str) -> ProfileRecord {
        ProfileRecord {
            user_id: user_id.to_string(),
            age: Some(age),
            gender: Some(gender.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_flag_key_parsing() {
        assert_eq!(
            PreferenceTag::from_flag_key("b_wantGenderWoman"),
            Some(PreferenceTag::Gender(Gender::Woman))
        );
        assert_eq!(
            PreferenceTag::from_flag_key("b_wantBodyBBW"),
            Some(PreferenceTag::Body(BodyType::Bbw))
        );
        assert_eq!(
            PreferenceTag::from_flag_key("b_wantHairLengthLong"),
            Some(PreferenceTag::HairLength(HairLength::Long))
        );
        assert_eq!(
            PreferenceTag::from_flag_key("b_wantBedroomPersonalityShy"),
            Some(PreferenceTag::Bedroom(BedroomPersonality::Shy))
        );
        assert_eq!(
            PreferenceTag::from_flag_key("b_wantOralGive"),
            Some(PreferenceTag::Activity(SexualActivity::OralGive))
        );
        assert_eq!(
            PreferenceTag::from_flag_key("b_whereHotelSplit"),
            Some(PreferenceTag::Meeting(MeetingPlace::HotelSplit))
        );
        assert_eq!(PreferenceTag::from_flag_key("b_wantBodyHairSmooth"), None);
        assert_eq!(PreferenceTag::from_flag_key("publicText"), None);
    }

    #[test]
    fn test_flag_value_coercion() {
        assert!(FlagValue::Bool(true).is_set());
        assert!(FlagValue::Int(1).is_set());
        assert!(FlagValue::Text("1".into()).is_set());
        assert!(FlagValue::Text(" Yes ".into()).is_set());
        assert!(!FlagValue::Text("0".into()).is_set());
        assert!(!FlagValue::Text("".into()).is_set());
        assert!(!FlagValue::Int(0).is_set());
    }

    #[test]
    fn test_record_normalization() {
        let mut raw = record("u1", 29, "woman");
        raw.latitude = Some(40.7);
        raw.longitude = Some(-74.0);
        raw.body = Some("slim".into());
        raw.overall_looks = Some("superModel".into());
        raw.want_age_from = Some(25);
        raw.want_age_to = Some(40);
        raw.interests = Some("Hiking, jazz ,hiking,,".into());
        raw.public_text = Some("hello".into());
        raw.avatar_url = Some("   ".into());
        raw.flags.insert("b_wantGenderMan".into(), FlagValue::Text("1".into()));
        raw.flags.insert("b_wantGenderWoman".into(), FlagValue::Int(0));
        raw.flags.insert("b_haveHerpes".into(), FlagValue::Bool(true));
        raw.flags.insert("b_noHIV".into(), FlagValue::Int(1));
        raw.flags.insert("b_noOtherSTIs".into(), FlagValue::Int(1));
        raw.flags.insert("b_smokeCigarettes".into(), FlagValue::Int(1));
        raw.flags.insert("b_noPoly".into(), FlagValue::Text("true".into()));

        let profile = Profile::try_from(raw).unwrap();

        assert_eq!(profile.gender, Gender::Woman);
        assert_eq!(profile.location, Some(GeoPoint::new(40.7, -74.0)));
        assert_eq!(profile.body_type, Some(BodyType::Slim));
        assert_eq!(profile.looks, Some(Looks::SuperModel));
        assert_eq!(profile.age_range, AgeRange { min: 25, max: 40 });
        assert_eq!(profile.interests, vec!["hiking", "jazz"]);
        assert!(profile.has_public_bio);
        assert!(!profile.has_avatar);
        assert!(profile.wants.wants_gender(Gender::Man));
        assert!(!profile.wants.wants_gender(Gender::Woman));
        assert!(profile.health.has.contains(&HealthCondition::Herpes));
        assert!(profile.health.rejects.contains(&HealthCondition::Hiv));
        assert!(profile.health.rejects.contains(&HealthCondition::OtherSti));
        assert!(profile.lifestyle.practices.contains(&LifestyleHabit::Cigarettes));
        assert!(profile.lifestyle.rejects.contains(&LifestyleHabit::Polyamory));
    }

    #[test]
    fn test_underage_record_rejected() {
        let result = Profile::try_from(record("kid", 17, "man"));
        assert_eq!(result.unwrap_err(), ProfileError::Underage(17));
    }

    #[test]
    fn test_unknown_gender_rejected() {
        let result = Profile::try_from(record("u", 30, "wizard"));
        assert!(matches!(result, Err(ProfileError::InvalidValue { field: "gender", .. })));
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let profile = Profile::try_from(record("u", 30, "man")).unwrap();
        assert_eq!(profile.location, None);
        assert_eq!(profile.age_range, AgeRange::default());
        assert_eq!(profile.max_distance_km, None);
        assert!(profile.wants.is_empty());
        assert!(profile.interests.is_empty());
    }

    #[test]
    fn test_partial_coordinates_dropped() {
        let mut raw = record("u", 30, "man");
        raw.latitude = Some(10.0);
        let profile = Profile::try_from(raw).unwrap();
        assert_eq!(profile.location, None);
    }

    #[test]
    fn test_has_category() {
        let prefs = Preferences::new()
            .with(PreferenceTag::Body(BodyType::Curvy))
            .with(PreferenceTag::Gender(Gender::Woman));
        assert!(prefs.has_category(PreferenceCategory::Body));
        assert!(!prefs.has_category(PreferenceCategory::Ethnicity));
        assert_eq!(prefs.len(), 2);
    }
}
