//! Pre-flight settings contract check.
//!
//! [`check_settings`] runs once before streaming starts. Every enabled method
//! must have its companion block, numeric fields must be finite and in range,
//! and every band or channel a block refers to must exist. The run assumes
//! this check has passed and does not repeat it.
use crate::channels::ChannelTable;
use crate::error::SettingsError;
use crate::settings::{Clip, NormalizationSettings, Settings};

/// Validate `settings` against the channel table. Fails on the first broken
/// rule; never mutates anything.
pub fn check_settings(settings: &Settings, channels: &ChannelTable) -> Result<(), SettingsError> {
    let s = settings;
    let m = &s.methods;

    positive("sampling_rate_features_hz", s.sampling_rate_features_hz)?;

    if !m.any() {
        return Err(SettingsError::NoMethodEnabled);
    }
    if channels.feature_idx().is_empty() {
        return Err(SettingsError::NoFeatureChannels);
    }

    if m.raw_resampling {
        let r = required(&s.raw_resampling_settings, "raw_resampling", "raw_resampling_settings")?;
        positive("raw_resampling_settings.resample_freq_hz", r.resample_freq_hz)?;
    }

    if m.raw_normalization {
        let n = required(
            &s.raw_normalization_settings,
            "raw_normalization",
            "raw_normalization_settings",
        )?;
        check_normalization("raw_normalization_settings", n)?;
    }

    if m.feature_normalization {
        let n = required(
            &s.feature_normalization_settings,
            "feature_normalization",
            "feature_normalization_settings",
        )?;
        check_normalization("feature_normalization_settings", n)?;
    }

    if m.project_cortex {
        let p = required(&s.project_cortex_settings, "project_cortex", "project_cortex_settings")?;
        positive("project_cortex_settings.max_dist_cm", p.max_dist_cm)?;
    }

    if m.project_subcortex {
        let p = required(
            &s.project_subcortex_settings,
            "project_subcortex",
            "project_subcortex_settings",
        )?;
        positive("project_subcortex_settings.max_dist_cm", p.max_dist_cm)?;
        for ch in s.subcortex_channels() {
            if !channels.is_feature_channel(ch) {
                return Err(SettingsError::UnknownChannel {
                    owner: "project_subcortex",
                    channel: ch.clone(),
                });
            }
        }
    }

    if m.bandpass_filter {
        if s.frequency_ranges_hz.is_empty() {
            return Err(SettingsError::MissingBlock {
                method: "bandpass_filter",
                block: "frequency_ranges_hz",
            });
        }
        for (name, [low, high]) in &s.frequency_ranges_hz {
            let field = format!("frequency_ranges_hz.{name}");
            positive(&field, *low)?;
            positive(&field, *high)?;
            if low >= high {
                return Err(SettingsError::invalid(field, format!("low {low} >= high {high}")));
            }
        }
        let b = required(
            &s.bandpass_filter_settings,
            "bandpass_filter",
            "bandpass_filter_settings",
        )?;
        if !b.bandpower_features.any() {
            return Err(SettingsError::NoBandpowerFeature);
        }
        for (band, seg) in &b.segment_lengths_ms {
            band_exists(s, "bandpass_filter_settings.segment_lengths_ms", band)?;
            positive(&format!("bandpass_filter_settings.segment_lengths_ms.{band}"), *seg)?;
        }
    }

    if m.kalman_filter {
        let k = required(&s.kalman_filter_settings, "kalman_filter", "kalman_filter_settings")?;
        positive("kalman_filter_settings.Tp", k.tp)?;
        finite("kalman_filter_settings.sigma_w", k.sigma_w)?;
        finite("kalman_filter_settings.sigma_v", k.sigma_v)?;
        if k.frequency_bands.is_empty() {
            return Err(SettingsError::invalid(
                "kalman_filter_settings.frequency_bands",
                "no frequency band specified",
            ));
        }
        for band in &k.frequency_bands {
            band_exists(s, "kalman_filter_settings", band)?;
        }
    }

    if m.sharpwave_analysis {
        let sw = required(
            &s.sharpwave_analysis_settings,
            "sharpwave_analysis",
            "sharpwave_analysis_settings",
        )?;
        positive("sharpwave_analysis_settings.filter_low_cutoff_hz", sw.filter_low_cutoff_hz)?;
        positive("sharpwave_analysis_settings.filter_high_cutoff_hz", sw.filter_high_cutoff_hz)?;
        if sw.filter_high_cutoff_hz <= sw.filter_low_cutoff_hz {
            return Err(SettingsError::invalid(
                "sharpwave_analysis_settings.filter_high_cutoff_hz",
                "must be greater than filter_low_cutoff_hz",
            ));
        }
    }

    if m.coherence {
        let c = required(&s.coherence, "coherence", "coherence")?;
        for ch in c.channels.iter().flatten() {
            if channels.position(ch).is_none() {
                return Err(SettingsError::UnknownChannel {
                    owner: "coherence",
                    channel: ch.clone(),
                });
            }
        }
        for band in &c.frequency_bands {
            band_exists(s, "coherence", band)?;
        }
    }

    log::debug!("settings check passed");
    Ok(())
}

fn required<'a, T>(
    block: &'a Option<T>,
    method: &'static str,
    name: &'static str,
) -> Result<&'a T, SettingsError> {
    block
        .as_ref()
        .ok_or(SettingsError::MissingBlock { method, block: name })
}

fn check_normalization(prefix: &str, n: &NormalizationSettings) -> Result<(), SettingsError> {
    positive(&format!("{prefix}.normalization_time_s"), n.normalization_time_s)?;
    if let Clip::Value(v) = n.clip {
        positive(&format!("{prefix}.clip"), v)?;
    }
    Ok(())
}

fn band_exists(s: &Settings, owner: &'static str, band: &str) -> Result<(), SettingsError> {
    if s.frequency_ranges_hz.contains_key(band) {
        Ok(())
    } else {
        Err(SettingsError::UnknownFrequencyBand {
            owner,
            band: band.to_string(),
        })
    }
}

fn finite(field: &str, v: f64) -> Result<(), SettingsError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(SettingsError::invalid(field, format!("{v} is not finite")))
    }
}

fn positive(field: &str, v: f64) -> Result<(), SettingsError> {
    finite(field, v)?;
    if v > 0.0 {
        Ok(())
    } else {
        Err(SettingsError::invalid(field, format!("{v} must be > 0")))
    }
}
