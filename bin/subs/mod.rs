// Progress bar helpers. `pb_create!()` declares a module-level `PB` that the other macros drive.

macro_rules! pb_create {
    () => {
        ::lazy_static::lazy_static! {
            static ref PB: ::indicatif::ProgressBar = {
                let pb = ::indicatif::ProgressBar::new(1);
                if let Ok(style) = ::indicatif::ProgressStyle::with_template(
                    "{prefix:.bold} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb
            };
        }
    };
}

macro_rules! pb_create_spinner {
    () => {
        ::lazy_static::lazy_static! {
            static ref PB: ::indicatif::ProgressBar = {
                let pb = ::indicatif::ProgressBar::new_spinner();
                if let Ok(style) =
                    ::indicatif::ProgressStyle::with_template("{spinner} {prefix} [{elapsed_precise}]")
                {
                    pb.set_style(style);
                }
                pb.enable_steady_tick(::std::time::Duration::from_millis(120));
                pb
            };
        }
    };
}

macro_rules! pb_set_prefix {
    ($prefix:expr) => {
        PB.set_prefix($prefix)
    };
}

macro_rules! pb_set_length {
    ($len:expr) => {
        PB.set_length($len as u64)
    };
}

macro_rules! pb_set_position {
    ($pos:expr) => {
        PB.set_position($pos as u64)
    };
}

macro_rules! pb_inc {
    () => {
        PB.inc(1)
    };
}

macro_rules! pb_done {
    () => {
        PB.finish_and_clear()
    };
}

pub mod assess;
pub mod checkhardware;
pub mod crop;
pub mod filter;
pub mod reconstruct;
pub mod run;
pub mod runnable;
pub mod segment;
pub mod threshtest;
