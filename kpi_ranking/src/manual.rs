/*!

This is the long-form manual for `kpi_ranking` and `kpidash`.

## Input formats

Two exports are supported. Both are read by position: the header text of the sheet is
ignored and the columns are renamed to fixed names.

### App adoption (`--kind app`)

Two title rows, then one header row, then the data:

| Position | Column |
|---|---|
| 1 | `STT` |
| 2 | `Điện lực` (unit name) |
| 3 | `Số lượng KH quản lý` |
| 4 | `Số lượng thực hiện App` |
| 5 | `Tỷ lệ thực hiện qua App` (a ratio between 0 and 1) |

The column `Tỷ lệ thực hiện qua App (%)` is added: the ratio times 100, rounded to two
decimals. Units are ranked by decreasing percentage.

### Request handling (`--kind ticket`)

Three title rows, then one header row, then 9 columns of data. All 9 must be present,
only the first 5 are kept:

| Position | Column |
|---|---|
| 1 | `STT` |
| 2 | `Đơn vị` (unit name) |
| 3 | `Số yêu cầu xử lý` |
| 4 | `Phiếu trễ hạn` |
| 5 | `Tỷ lệ trễ hạn` |

The column `Tỷ lệ trễ hạn (%)` is added. It is always computed from the two counts,
whatever the rate column of the export says. Units are ranked by increasing
percentage.

## Company rows

Rows whose unit name contains "công ty" (any case) are company-wide totals. They are
shown at the end of the ranked table, in the order of the export, and never take part
in the top 3 / bottom 3 selection or in the charts.

Rows without a unit name are dropped.

## Top 3 / bottom 3

The top list holds the three largest percentages, largest first. The bottom list holds
the three smallest, smallest first. With fewer than three units, every unit is listed.

## Filtering

`--list-units` prints the units that can be selected. `--unit <name>` keeps only the
rows of that unit; the top and bottom lists are then computed on that single row.

## Outputs

* `--report` writes `Bao_cao_App_CSKH.docx` or `Bao_cao_Yeu_cau_KH.docx` in the output
  directory. An existing report with the same name is overwritten.
* `--charts` writes the three bar charts as PNG files.
* `--out` writes a JSON summary of the ranking, and `--reference` compares it with a
  previously saved summary.

*/
