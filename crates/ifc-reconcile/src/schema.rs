use crate::settings::{FieldKind, FieldSpec, SettingsSchema};

use FieldKind::{Bool, Float, Int, Structured, Text};

const fn f(key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec::new(key, kind)
}

/// Project settings exchanged with the watch-tower-setting endpoint.
///
/// `projectName` identifies the target and goes out on every write.
pub static PROJECT_SCHEMA: SettingsSchema = SettingsSchema::new("project", PROJECT_FIELDS);

const PROJECT_FIELDS: &[FieldSpec] = &[
    FieldSpec::always_sent("projectName", Text),
    f("projectDisplayName", Text),
    f("projectTimeZone", Text),
    // detection
    f("cValue", Int),
    f("pValue", Float),
    f("dailyModelSpan", Int),
    f("minValidModelSpan", Int),
    f("samplingInterval", Int),
    f("anomalySamplingInterval", Int),
    f("anomalyDetectionMode", Int),
    f("hotEventDetectionMode", Int),
    f("similaritySensitivity", Text),
    f("featureOutlierSensitivity", Text),
    f("featureOutlierThreshold", Float),
    f("enableStreamDetection", Bool),
    f("largeProject", Bool),
    f("isEdgeBrain", Bool),
    f("isSourceProject", Bool),
    f("trainingFilter", Bool),
    // log model
    f("keywordFeatureNumber", Int),
    f("maxLogModelSize", Int),
    f("modelKeywordSetting", Int),
    f("keywordSetting", Int),
    f("nlpFlag", Bool),
    f("projectModelFlag", Bool),
    f("maximumThreads", Int),
    f("logDetectionMinCount", Int),
    f("logDetectionSize", Int),
    f("maximumDetectionWaitTime", Int),
    f("logPatternLimitLevel", Int),
    f("normalEventCausalFlag", Bool),
    f("collectAllRareEventsFlag", Bool),
    f("rareEventAlertThresholds", Int),
    f("logAnomalyEventBaseScore", Text),
    f("rareNumberLimit", Int),
    f("whitelistNumberLimit", Int),
    f("newPatternNumberLimit", Int),
    f("newPatternRange", Int),
    f("hotNumberLimit", Int),
    f("coldNumberLimit", Int),
    f("rareAnomalyType", Int),
    f("hotEventThreshold", Int),
    f("coldEventThreshold", Int),
    f("hotEventCalmDownPeriod", Int),
    f("disableLogCompressEvent", Bool),
    f("enableHotEvent", Bool),
    f("instanceDownEnable", Bool),
    f("showInstanceDown", Bool),
    f("prettyJsonConvertorFlag", Bool),
    f("zoneNameKey", Text),
    f("multiLineFlag", Bool),
    f("disableModelKeywordStatsCollection", Bool),
    f("instanceConvertFlag", Bool),
    f("newAlertFlag", Bool),
    f("isGroupingByInstance", Bool),
    f("isTracePrompt", Bool),
    f("ignoreInstanceForKB", Bool),
    // incident prediction and root cause
    f("incidentPredictionWindow", Int),
    f("minIncidentPredictionWindow", Int),
    f("incidentRelationSearchWindow", Int),
    f("incidentPredictionEventLimit", Int),
    f("rootCauseCountThreshold", Int),
    f("rootCauseProbabilityThreshold", Float),
    f("compositeRCALimit", Int),
    f("rootCauseLogMessageSearchRange", Int),
    f("causalPredictionSetting", Int),
    f("causalMinDelay", Text),
    f("rootCauseRankSetting", Int),
    f("maximumRootCauseResultSize", Int),
    f("multiHopSearchLevel", Int),
    f("multiHopSearchLimit", Text),
    f("predictionRuleActiveCondition", Int),
    f("predictionRuleFalsePositiveThreshold", Int),
    f("predictionRuleActiveThreshold", Float),
    f("predictionRuleInactiveThreshold", Float),
    f("predictionProbabilityThreshold", Float),
    f("predictionCountThreshold", Int),
    f("enableAnomalyScoreEscalation", Bool),
    f("escalationAnomalyScoreThreshold", Text),
    f("ignoreAnomalyScoreThreshold", Text),
    // cost and alerting
    f("avgPerIncidentDowntimeCost", Float),
    f("alertHourlyCost", Float),
    f("alertAverageTime", Int),
    f("enableNewAlertEmail", Bool),
    // retention
    f("retentionTime", Int),
    f("UBLRetentionTime", Int),
    // webhook
    f("webhookUrl", Text),
    f("webhookHeaderList", Structured),
    f("webhookTypeSetStr", Text),
    f("webhookBlackListSetStr", Text),
    f("webhookCriticalKeywordSetStr", Text),
    f("webhookAlertDampening", Int),
    f("maxWebHookRequestSize", Int),
    f("proxy", Text),
    // nested sections
    f("baseValueSetting", Structured),
    f("cdfSetting", Structured),
    f("emailSetting", Structured),
    f("instanceGroupingUpdate", Structured),
    f("llmEvaluationSetting", Structured),
    f("logToLogSettingList", Structured),
    f("sharedUsernames", Structured),
];

/// System-level JWT settings.
pub static JWT_SCHEMA: SettingsSchema = SettingsSchema::new("jwt", JWT_FIELDS);

const JWT_FIELDS: &[FieldSpec] = &[
    f("systemLevelJWTSecret", Text),
    f("jwtType", Int),
];
