//! Hourly stats sampling.
//!
//! At most two contributions per hour: one optional sub-sample from the
//! middle of the hour and the full sample at its end. The full sample
//! averages what was accumulated and writes it to NV.

use crate::app::ports::{NonVolatileStore, RandomSource};

use super::codec::{compress_temp_c16, smart_div_to_u8};
use super::store::update_stats_pair;
use super::StatsSet;

/// Ambient light is capped so it can never read as unset.
pub const MAX_STATS_AMBLIGHT: u8 = 254;

/// Sensor values feeding one sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsReading {
    pub warm_mode: bool,
    pub ambient_light: u8,
    pub temp_c16: i16,
    /// `None` when occupancy is not supported.
    pub occupancy_pc: Option<u8>,
    /// `None` when no humidity sensor is fitted.
    pub humidity_pc: Option<u8>,
}

/// Running totals between the sub-sample and the full sample.
#[derive(Debug, Clone, Default)]
pub struct StatsSampler {
    sample_count: u8,
    warm_count: i8,
    amb_light_total: u16,
    temp_c16_total: i32,
    occ_total: u16,
    rh_total: u16,
}

impl StatsSampler {
    pub const fn new() -> Self {
        Self {
            sample_count: 0,
            warm_count: 0,
            amb_light_total: 0,
            temp_c16_total: 0,
            occ_total: 0,
            rh_total: 0,
        }
    }

    /// Samples accumulated since the last full sample.
    pub fn pending_samples(&self) -> u8 {
        self.sample_count
    }

    /// Accumulate a reading; on `full_sample` also write hour `hh` to NV.
    /// A second sub-sample in the same hour is ignored.
    pub fn sample_stats(
        &mut self,
        full_sample: bool,
        hh: u8,
        reading: &StatsReading,
        store: &mut impl NonVolatileStore,
        rng: &mut impl RandomSource,
    ) {
        if !full_sample && self.sample_count != 0 {
            return;
        }
        let first = self.sample_count == 0;
        self.sample_count += 1;

        if reading.warm_mode {
            self.warm_count = self.warm_count.saturating_add(1);
        } else {
            self.warm_count = self.warm_count.saturating_sub(1);
        }

        let amb = u16::from(reading.ambient_light.min(MAX_STATS_AMBLIGHT));
        let occ = u16::from(reading.occupancy_pc.unwrap_or(0));
        let rh = u16::from(reading.humidity_pc.unwrap_or(0).min(100));
        let temp = i32::from(reading.temp_c16);
        if first {
            self.amb_light_total = amb;
            self.temp_c16_total = temp;
            self.occ_total = occ;
            self.rh_total = rh;
        } else {
            self.amb_light_total += amb;
            self.temp_c16_total += temp;
            self.occ_total += occ;
            self.rh_total += rh;
        }

        if !full_sample {
            return;
        }
        let sc = self.sample_count;
        self.sample_count = 0;

        let temp_mean = if sc == 1 {
            self.temp_c16_total
        } else {
            (self.temp_c16_total + 1) >> 1
        };
        update_stats_pair(store, StatsSet::TempByHour, hh, compress_temp_c16(temp_mean), rng);
        update_stats_pair(
            store,
            StatsSet::AmbLightByHour,
            hh,
            smart_div_to_u8(self.amb_light_total, sc),
            rng,
        );
        if reading.occupancy_pc.is_some() {
            update_stats_pair(store, StatsSet::OccPcByHour, hh, smart_div_to_u8(self.occ_total, sc), rng);
        }
        if reading.humidity_pc.is_some() {
            update_stats_pair(store, StatsSet::RhPcByHour, hh, smart_div_to_u8(self.rh_total, sc), rng);
        }

        // Bit 7 set means never written: seed every history bit from this sample.
        // Otherwise shift the week down and put today's majority in bit 6.
        let addr = StatsSet::WarmModeByHourOfWeek.addr(hh);
        let history = store.read_byte(addr);
        if history & 0x80 != 0 {
            store.smart_clear_bits(addr, if reading.warm_mode { 0x7f } else { 0 });
        } else {
            let mut next = (history >> 1) & 0x3f;
            if self.warm_count > 0 {
                next |= 0x40;
            }
            store.smart_update_byte(addr, next);
        }
        self.warm_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;
    use crate::rng::Rng8;
    use crate::stats::codec::expand_temp_c16;
    use crate::stats::store::get_by_hour_stat;

    fn reading(warm: bool, temp_c16: i16, amb: u8) -> StatsReading {
        StatsReading {
            warm_mode: warm,
            ambient_light: amb,
            temp_c16,
            occupancy_pc: Some(50),
            humidity_pc: None,
        }
    }

    #[test]
    fn sub_then_full_sample_averages() {
        let mut store = NvsAdapter::new();
        let mut rng = Rng8::new();
        let mut s = StatsSampler::new();
        s.sample_stats(false, 9, &reading(true, 18 << 4, 100), &mut store, &mut rng);
        assert_eq!(s.pending_samples(), 1);
        s.sample_stats(true, 9, &reading(true, 20 << 4, 201), &mut store, &mut rng);
        assert_eq!(s.pending_samples(), 0);
        let t = get_by_hour_stat(&store, StatsSet::TempByHour, 9).unwrap();
        assert_eq!(expand_temp_c16(t), Some(19 << 4));
        assert_eq!(get_by_hour_stat(&store, StatsSet::AmbLightByHour, 9), Some(151));
        assert_eq!(get_by_hour_stat(&store, StatsSet::OccPcByHour, 9), Some(50));
        assert_eq!(get_by_hour_stat(&store, StatsSet::RhPcByHour, 9), None);
    }

    #[test]
    fn at_most_two_samples_per_hour() {
        let mut store = NvsAdapter::new();
        let mut rng = Rng8::new();
        let mut s = StatsSampler::new();
        s.sample_stats(false, 1, &reading(false, 16 << 4, 10), &mut store, &mut rng);
        s.sample_stats(false, 1, &reading(false, 16 << 4, 250), &mut store, &mut rng);
        assert_eq!(s.pending_samples(), 1);
        s.sample_stats(true, 1, &reading(false, 16 << 4, 10), &mut store, &mut rng);
        assert_eq!(get_by_hour_stat(&store, StatsSet::AmbLightByHour, 1), Some(10));
    }

    #[test]
    fn ambient_light_capped_below_unset() {
        let mut store = NvsAdapter::new();
        let mut rng = Rng8::new();
        let mut s = StatsSampler::new();
        s.sample_stats(true, 2, &reading(false, 0, 255), &mut store, &mut rng);
        assert_eq!(get_by_hour_stat(&store, StatsSet::AmbLightByHour, 2), Some(254));
    }

    #[test]
    fn warm_history_seeds_then_shifts() {
        let mut store = NvsAdapter::new();
        let mut rng = Rng8::new();
        let mut s = StatsSampler::new();
        s.sample_stats(true, 4, &reading(true, 0, 0), &mut store, &mut rng);
        assert_eq!(get_by_hour_stat(&store, StatsSet::WarmModeByHourOfWeek, 4), Some(0x7f));
        s.sample_stats(true, 4, &reading(false, 0, 0), &mut store, &mut rng);
        assert_eq!(get_by_hour_stat(&store, StatsSet::WarmModeByHourOfWeek, 4), Some(0x3f));
        s.sample_stats(true, 4, &reading(true, 0, 0), &mut store, &mut rng);
        assert_eq!(get_by_hour_stat(&store, StatsSet::WarmModeByHourOfWeek, 4), Some(0x5f));
    }

    #[test]
    fn first_frost_sample_clears_all_history() {
        let mut store = NvsAdapter::new();
        let mut rng = Rng8::new();
        let mut s = StatsSampler::new();
        s.sample_stats(true, 0, &reading(false, 0, 0), &mut store, &mut rng);
        assert_eq!(get_by_hour_stat(&store, StatsSet::WarmModeByHourOfWeek, 0), Some(0));
    }
}
