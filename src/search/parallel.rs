use crate::graph::Node;
use crate::search::domain::{
    advance_partner, axis_permutation, calc_bound, filter_domains, fix_pivot, select_domain,
    AxisPerm, MultiDomain, PartialTuple,
};
use crate::search::pool::{Position, TaskFn, VertexTuple, WorkerState, SPLIT_LEVELS};
use crate::search::sequential::solve_sequential;
use crate::search::{format_mapping, SearchContext};
use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Branch-and-bound kernel for the upper part of the search tree. Branching
/// is identical to the sequential kernel, but frames at `depth <=
/// SPLIT_LEVELS` publish themselves into the helper pool and race idle
/// workers for the branch indices of the outermost partner axis.
pub(crate) fn solve_parallel(
    ctx: &Arc<SearchContext>,
    depth: u32,
    position: Position,
    state: &mut WorkerState,
    current: &mut Vec<VertexTuple>,
    domains: &mut Vec<MultiDomain>,
    bufs: &mut Vec<Vec<Node>>,
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

    // branch indices of the outermost axis, including the terminal skip
    // branch, dispensed by a counter shared with any helper
    let i_end = domains[bd_idx].len(perm[1]) + 2;
    let shared_i = Arc::new(AtomicUsize::new(0));

    if depth <= SPLIT_LEVELS {
        let helper: TaskFn = {
            let ctx = Arc::clone(ctx);
            let shared_i = Arc::clone(&shared_i);
            let current = current.clone();
            let domains = domains.clone();
            let bufs = bufs.clone();
            let perm = perm.clone();
            Arc::new(move |helper_state: &mut WorkerState| {
                let mut my_branch = shared_i.fetch_add(1, Ordering::SeqCst);
                if my_branch >= i_end {
                    return; // nothing left to claim, skip the cloning
                }

                let mut current = current.clone();
                let mut domains = domains.clone();
                let mut bufs = bufs.clone();
                let mut partial = partial;
                run_branches(
                    &ctx,
                    depth,
                    position,
                    helper_state,
                    &shared_i,
                    &mut my_branch,
                    bd_idx,
                    &perm,
                    &mut partial,
                    &mut current,
                    &mut domains,
                    &mut bufs,
                );
            })
        };

        // grab the first branch before advertising the task
        let mut my_branch = shared_i.fetch_add(1, Ordering::SeqCst);
        ctx.pool.get_help_with(position, helper, || {
            run_branches(
                ctx,
                depth,
                position,
                state,
                &shared_i,
                &mut my_branch,
                bd_idx,
                &perm,
                &mut partial,
                current,
                domains,
                bufs,
            );
        });
    } else {
        let mut my_branch = shared_i.fetch_add(1, Ordering::SeqCst);
        run_branches(
            ctx,
            depth,
            position,
            state,
            &shared_i,
            &mut my_branch,
            bd_idx,
            &perm,
            &mut partial,
            current,
            domains,
            bufs,
        );
    }
}

/// The branch loop shared by the publishing thread and its helpers. Everyone
/// walks the same deterministic enumeration over their own copy of the frame
/// state, but only the holder of the matching claim descends into an
/// outermost branch; inner axes belong to whoever owns the outer one.
#[allow(clippy::too_many_arguments)]
fn run_branches(
    ctx: &Arc<SearchContext>,
    depth: u32,
    position: Position,
    state: &mut WorkerState,
    shared_i: &AtomicUsize,
    my_branch: &mut usize,
    bd_idx: usize,
    perm: &AxisPerm,
    partial: &mut PartialTuple,
    current: &mut Vec<VertexTuple>,
    domains: &mut Vec<MultiDomain>,
    bufs: &mut Vec<Vec<Node>>,
) {
    let k = ctx.k();
    let mut w0_index = 0usize;

    let mut i = 1usize;
    while i > 0 {
        let axis = perm[i];
        if advance_partner(&mut bufs[axis], &domains[bd_idx], axis, &mut partial[axis]) {
            let outer = i == 1;
            let mine = !outer || *my_branch == w0_index;
            if mine {
                i += 1;
                if i == k {
                    let tuple: VertexTuple = partial[..k]
                        .iter()
                        .map(|slot| slot.expect("tuple slot unbound"))
                        .collect();
                    current.push(tuple.clone());
                    let mut refined = filter_domains(
                        domains,
                        bufs,
                        &ctx.graphs,
                        &tuple,
                        ctx.settings.multiway(),
                    );
                    if ctx.abort.is_set() {
                        return;
                    }
                    if depth > SPLIT_LEVELS {
                        solve_sequential(ctx, depth + 1, state, current, &mut refined, bufs);
                    } else {
                        let mut child = position;
                        child.add(depth, ctx.next_position());
                        solve_parallel(ctx, depth + 1, child, state, current, &mut refined, bufs);
                    }
                    i -= 1;
                    current.pop();
                }
                if outer {
                    *my_branch = shared_i.fetch_add(1, Ordering::SeqCst);
                }
            }
            if outer {
                w0_index += 1;
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

    // the skip branch is one more claimable index
    if *my_branch == w0_index {
        if ctx.abort.is_set() {
            return;
        }
        if depth > SPLIT_LEVELS {
            solve_sequential(ctx, depth + 1, state, current, domains, bufs);
        } else {
            let mut child = position;
            child.add(depth, ctx.next_position());
            solve_parallel(ctx, depth + 1, child, state, current, domains, bufs);
        }
    }
}
