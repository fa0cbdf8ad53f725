/*!
 * Safety Scan
 *
 * Banker's-style reachability check over an allocation snapshot: repeatedly
 * let any process whose outstanding request fits in `work` finish and return
 * its allocation, until no more progress is possible. Processes left
 * unfinished cannot all complete from the current state.
 *
 * This answers "cannot all finish", not "which minimal cycle"; with at most
 * one outstanding unit request per process the two coincide closely enough
 * for detection.
 */

use crate::coordinator::AllocationSnapshot;

/// Outcome of one scan, as row indices into the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyScan {
    /// Rows in the order they finished
    pub finished: Vec<usize>,
    /// Rows that never finished, ascending
    pub unfinished: Vec<usize>,
}

impl SafetyScan {
    #[inline]
    pub fn is_safe(&self) -> bool {
        self.unfinished.is_empty()
    }
}

/// Run the scan; rows are visited in registration order on every pass
pub fn scan(snapshot: &AllocationSnapshot) -> SafetyScan {
    let n = snapshot.process_count();
    let mut work = snapshot.available.clone();
    let mut finish = vec![false; n];
    let mut finished = Vec::with_capacity(n);

    loop {
        let mut progress = false;
        for i in 0..n {
            if finish[i] || !fits(&snapshot.request[i], &work) {
                continue;
            }
            for (w, a) in work.iter_mut().zip(&snapshot.allocation[i]) {
                *w += *a;
            }
            finish[i] = true;
            finished.push(i);
            progress = true;
        }
        if !progress || finished.len() == n {
            break;
        }
    }

    let unfinished = (0..n).filter(|i| !finish[*i]).collect();
    SafetyScan {
        finished,
        unfinished,
    }
}

/// `request <= work` componentwise
#[inline]
fn fits(request: &[u32], work: &[u32]) -> bool {
    request.iter().zip(work).all(|(r, w)| r <= w)
}
