use super::util::Result;

pub fn readable_size(bytes: u64) -> (f64, &'static str) {
    let units: [(f64, &'static str); 5] = [
        (1.0, "B"),
        (1024.0, "KiB"),
        (1024.0 * 1024.0, "MiB"),
        (1024.0 * 1024.0 * 1024.0, "GiB"),
        (1024.0 * 1024.0 * 1024.0 * 1024.0, "TiB"),
    ];

    let value = bytes as f64;
    let mut unit = units[0];
    for next in units.iter().skip(1) {
        if value >= next.0 {
            unit = *next;
        } else {
            break;
        }
    }

    (value / unit.0, unit.1)
}

#[cfg(target_os = "macos")]
pub fn peak_memory_usage() -> Result<u64> {
    unsafe {
        let mut rusage: libc::rusage = std::mem::zeroed();
        let retval = libc::getrusage(libc::RUSAGE_SELF, &mut rusage as *mut _);
        match retval {
            0 => Ok(rusage.ru_maxrss as u64),
            _ => Err(crate::varhive_error!("libc::getrusage call failed")),
        }
    }
}

#[cfg(not(target_os = "macos"))]
pub fn peak_memory_usage() -> Result<u64> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    let kib = status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .map(|value| value.trim().trim_end_matches("kB").trim().parse::<u64>())
        .transpose()?
        .ok_or_else(|| crate::varhive_error!("VmHWM missing from /proc/self/status"))?;
    Ok(kib * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_size_picks_largest_unit() {
        assert_eq!(readable_size(512), (512.0, "B"));
        assert_eq!(readable_size(2048), (2.0, "KiB"));
        let (value, unit) = readable_size(3 * 1024 * 1024 * 1024);
        assert_eq!(unit, "GiB");
        assert!((value - 3.0).abs() < f64::EPSILON);
    }
}
