/// Keep SIGINT away from the driver while a job runs.
///
/// While an `Uninterrupt` is alive, an interrupt ("control-C") no longer
/// kills this process. It still reaches the children in the foreground
/// process group, so the external tool being run dies from it, the driver
/// sees the signal in the child's exit status, and unwinds normally. This is
/// what lets guards such as the job lock clean up after a cancelled job.
///
/// ```text
/// let result = {
///     let _unint = Uninterrupt::suppress();
///     process_job()
/// };
/// ```
///
/// The previous disposition is restored on drop.
pub struct Uninterrupt {
    previous: libc::sighandler_t,
}

extern "C" fn nop(_: libc::c_int) {}

impl Uninterrupt {
    pub fn suppress() -> Self {
        // A no-op handler rather than SIG_IGN: ignored dispositions are
        // inherited across exec, handlers are reset to the default.
        let handler = nop as extern "C" fn(libc::c_int) as libc::sighandler_t;
        let previous = unsafe { libc::signal(libc::SIGINT, handler) };
        Self { previous }
    }
}

impl Drop for Uninterrupt {
    fn drop(&mut self) {
        let previous = if self.previous == libc::SIG_ERR {
            libc::SIG_DFL
        } else {
            self.previous
        };
        unsafe {
            libc::signal(libc::SIGINT, previous);
        }
    }
}
