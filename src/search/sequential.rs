use crate::graph::Node;
use crate::search::domain::{
    advance_partner, axis_permutation, calc_bound, filter_domains, fix_pivot, select_domain,
    MultiDomain,
};
use crate::search::pool::{VertexTuple, WorkerState};
use crate::search::{format_mapping, SearchContext};
use log::trace;

/// Recursive branch-and-bound kernel used below the split depth. Mutates the
/// domain list and buffers of its own frame only within the windows it owns;
/// descendants receive freshly filtered domain lists.
pub(crate) fn solve_sequential(
    ctx: &SearchContext,
    depth: u32,
    state: &mut WorkerState,
    current: &mut Vec<VertexTuple>,
    domains: &mut Vec<MultiDomain>,
    bufs: &mut [Vec<Node>],
) {
    if ctx.abort.is_set() {
        return;
    }

    if current.len() > state.incumbent.len() {
        state.incumbent.clone_from(current);
        ctx.incumbent.update(current.len() as u32);
    }

    trace!("{} : {}", format_mapping(current), depth);
    state.nodes += 1;

    let k = ctx.k();
    let bound = (current.len() + calc_bound(domains, k)) as u32;
    if bound <= ctx.incumbent.get() || bound < ctx.goal {
        return;
    }
    if ctx.settings.big_first && ctx.incumbent.get() == ctx.goal {
        return;
    }

    let bd_idx = match select_domain(
        domains,
        &bufs[0],
        k,
        ctx.settings.heuristic,
        ctx.settings.connected,
        current.len(),
    ) {
        Some(idx) => idx,
        None => return,
    };

    let perm = axis_permutation(&domains[bd_idx], k, ctx.settings.axis_order);
    let mut partial = fix_pivot(bufs, &mut domains[bd_idx], &perm);

    // odometer over the K-1 partner axes; a failed axis rolls back to the
    // previous one, a completed tuple descends
    let mut i = 1usize;
    while i > 0 {
        let axis = perm[i];
        if advance_partner(&mut bufs[axis], &domains[bd_idx], axis, &mut partial[axis]) {
            i += 1;
            if i == k {
                let tuple: VertexTuple = partial[..k]
                    .iter()
                    .map(|slot| slot.expect("tuple slot unbound"))
                    .collect();
                current.push(tuple.clone());
                let mut refined =
                    filter_domains(domains, bufs, &ctx.graphs, &tuple, ctx.settings.multiway());
                if ctx.abort.is_set() {
                    return;
                }
                solve_sequential(ctx, depth + 1, state, current, &mut refined, bufs);
                i -= 1;
                current.pop();
            }
        } else {
            partial[axis] = None;
            i -= 1;
        }
    }

    if domains[bd_idx].len(perm[0]) == 0 {
        domains.swap_remove(bd_idx);
    } else {
        for &g in &perm[1..] {
            domains[bd_idx].grow(g);
        }
    }

    // the pivot participates in no tuple at all
    solve_sequential(ctx, depth + 1, state, current, domains, bufs);
}
